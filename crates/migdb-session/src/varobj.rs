//! Client-side mirror of the debugger's variable objects.
//!
//! Names are hierarchical: `var1` is a root, `var1.public.x` one of its
//! descendants. The table is kept in lockstep with the debugger, so
//! deleting a root removes every descendant as well.

use std::collections::HashMap;

use migdb_mi::Fields;

use crate::error::SessionError;

/// One variable object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarObject {
    /// Debugger-side name, e.g. `var3.first`.
    pub name: String,
    /// Expression shown for this object (a child's `exp` for children).
    pub expression: String,
    pub type_name: Option<String>,
    /// Last value string reported by the debugger.
    pub value: Option<String>,
    pub num_children: u32,
    pub in_scope: bool,
    /// Child names in debugger order, once listed.
    pub children: Option<Vec<String>>,
    /// Full expression for a child, once fetched.
    pub path_expression: Option<String>,
}

impl VarObject {
    /// First segment of the name.
    pub fn root(&self) -> &str {
        root_of(&self.name)
    }

    /// Build from a `-var-create` response for `expression`.
    pub fn from_create(expression: &str, fields: &Fields) -> Result<Self, SessionError> {
        let name = fields
            .get_str("name")
            .ok_or_else(|| SessionError::InvalidResponse("var-create without name".into()))?;
        Ok(Self {
            name: name.to_string(),
            expression: expression.to_string(),
            type_name: fields.get_str("type").map(str::to_string),
            value: fields.get_str("value").map(str::to_string),
            num_children: num_children(fields, "numchild"),
            in_scope: true,
            children: None,
            path_expression: None,
        })
    }

    /// Build from one `child={...}` tuple of `-var-list-children`.
    pub fn from_child(fields: &Fields) -> Option<Self> {
        let name = fields.get_str("name")?;
        Some(Self {
            name: name.to_string(),
            expression: fields.get_str("exp").unwrap_or(name).to_string(),
            type_name: fields.get_str("type").map(str::to_string),
            value: fields.get_str("value").map(str::to_string),
            num_children: num_children(fields, "numchild"),
            in_scope: true,
            children: None,
            path_expression: None,
        })
    }
}

/// First `.`-separated segment of a variable object name.
pub fn root_of(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

fn num_children(fields: &Fields, key: &str) -> u32 {
    fields
        .get_str(key)
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Variable objects by name.
#[derive(Debug, Clone, Default)]
pub struct VarTable {
    vars: HashMap<String, VarObject>,
}

impl VarTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, var: VarObject) {
        self.vars.insert(var.name.clone(), var);
    }

    pub fn get(&self, name: &str) -> Option<&VarObject> {
        self.vars.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut VarObject> {
        self.vars.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Remove `name` and all of its descendants. Returns the removed names.
    pub fn remove_tree(&mut self, name: &str) -> Vec<String> {
        let prefix = format!("{name}.");
        let mut removed: Vec<String> = self
            .vars
            .keys()
            .filter(|key| *key == name || key.starts_with(&prefix))
            .cloned()
            .collect();
        for key in &removed {
            self.vars.remove(key);
        }
        if let Some((parent, _)) = name.rsplit_once('.') {
            if let Some(children) = self.vars.get_mut(parent).and_then(|p| p.children.as_mut()) {
                children.retain(|child| child != name);
            }
        }
        removed.sort();
        removed
    }

    /// Replace the children of `parent` wholesale.
    ///
    /// Previously listed children that are no longer reported are removed
    /// together with their descendants.
    pub fn set_children(&mut self, parent: &str, children: Vec<VarObject>) -> Result<(), SessionError> {
        let previous = self
            .vars
            .get(parent)
            .ok_or_else(|| SessionError::UnknownVariable(parent.to_string()))?
            .children
            .clone()
            .unwrap_or_default();
        let names: Vec<String> = children.iter().map(|c| c.name.clone()).collect();
        for stale in previous.iter().filter(|name| !names.contains(name)) {
            self.remove_tree(stale);
        }
        for child in children {
            self.insert(child);
        }
        if let Some(var) = self.vars.get_mut(parent) {
            var.num_children = names.len() as u32;
            var.children = Some(names);
        }
        Ok(())
    }

    /// The child of `parent` whose expression is `expression`.
    pub fn child_by_expression(&self, parent: &str, expression: &str) -> Option<&VarObject> {
        self.vars
            .get(parent)?
            .children
            .as_ref()?
            .iter()
            .filter_map(|name| self.vars.get(name))
            .find(|child| child.expression == expression)
    }

    /// Apply one `-var-update` changelist entry.
    ///
    /// Returns the updated object when its value, scope or type actually
    /// changed, `None` when nothing did or the name is unknown.
    pub fn apply_update(&mut self, change: &Fields) -> Option<VarObject> {
        let name = change.get_str("name")?;
        let var = self.vars.get_mut(name)?;
        let mut changed = false;

        if let Some(value) = change.get_str("value") {
            if var.value.as_deref() != Some(value) {
                var.value = Some(value.to_string());
                changed = true;
            }
        }
        if let Some(scope) = change.get_str("in_scope") {
            let in_scope = scope == "true";
            if var.in_scope != in_scope {
                var.in_scope = in_scope;
                changed = true;
            }
        }
        let mut reset_children = false;
        if change.get_str("type_changed") == Some("true") {
            if let Some(new_type) = change.get_str("new_type") {
                var.type_name = Some(new_type.to_string());
            }
            reset_children = true;
            changed = true;
        }
        if let Some(count) = change.get_str("new_num_children").and_then(|n| n.parse().ok()) {
            var.num_children = count;
            reset_children = true;
            changed = true;
        }

        let snapshot = var.clone();
        if reset_children {
            if let Some(children) = self.vars.get_mut(name).and_then(|v| v.children.take()) {
                for child in children {
                    self.remove_tree(&child);
                }
            }
        }
        changed.then(|| self.vars.get(name).cloned().unwrap_or(snapshot))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use migdb_mi::{MiGrammar, Record};

    use super::*;

    fn fields(line: &str) -> Fields {
        match MiGrammar::new().parse_line(line).unwrap() {
            Record::Result { fields, .. } => fields,
            other => panic!("expected result record, got {other:?}"),
        }
    }

    fn var(name: &str, value: &str) -> VarObject {
        VarObject {
            name: name.into(),
            expression: name.into(),
            type_name: Some("int".into()),
            value: Some(value.into()),
            num_children: 0,
            in_scope: true,
            children: None,
            path_expression: None,
        }
    }

    #[test]
    fn varobj_from_create() {
        let f = fields(r#"^done,name="var1",numchild="2",value="{...}",type="point",thread-id="1",has_more="0""#);
        let v = VarObject::from_create("p", &f).unwrap();
        assert_eq!(v.name, "var1");
        assert_eq!(v.expression, "p");
        assert_eq!(v.type_name.as_deref(), Some("point"));
        assert_eq!(v.value.as_deref(), Some("{...}"));
        assert_eq!(v.num_children, 2);
        assert!(v.in_scope);
        assert!(v.children.is_none());
    }

    #[test]
    fn varobj_from_create_requires_name() {
        let f = fields(r#"^done,numchild="0""#);
        assert!(matches!(
            VarObject::from_create("x", &f),
            Err(SessionError::InvalidResponse(_))
        ));
    }

    #[test]
    fn varobj_root() {
        assert_eq!(var("var4.public.x", "1").root(), "var4");
        assert_eq!(root_of("var7"), "var7");
    }

    #[test]
    fn table_apply_update_value_and_scope() {
        let mut table = VarTable::new();
        table.insert(var("var1", "1"));

        let change = fields(r#"^done,name="var1",value="2",in_scope="true",type_changed="false""#);
        let updated = table.apply_update(&change).unwrap();
        assert_eq!(updated.value.as_deref(), Some("2"));

        // same value again is not a change
        assert!(table.apply_update(&change).is_none());

        let out = fields(r#"^done,name="var1",in_scope="false""#);
        assert!(!table.apply_update(&out).unwrap().in_scope);

        let unknown = fields(r#"^done,name="var9",value="3""#);
        assert!(table.apply_update(&unknown).is_none());
    }

    #[test]
    fn table_type_change_drops_children() {
        let mut table = VarTable::new();
        table.insert(var("var1", "{...}"));
        table
            .set_children("var1", vec![var("var1.a", "1"), var("var1.b", "2")])
            .unwrap();
        assert_eq!(table.len(), 3);

        let change = fields(
            r#"^done,name="var1",in_scope="true",type_changed="true",new_type="other",new_num_children="1""#,
        );
        let updated = table.apply_update(&change).unwrap();
        assert_eq!(updated.type_name.as_deref(), Some("other"));
        assert_eq!(updated.num_children, 1);
        assert!(updated.children.is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn table_set_children_replaces_wholesale() {
        let mut table = VarTable::new();
        table.insert(var("var1", "{...}"));
        table
            .set_children("var1", vec![var("var1.a", "1"), var("var1.b", "2")])
            .unwrap();
        table.set_children("var1", vec![var("var1.a", "5")]).unwrap();

        let parent = table.get("var1").unwrap();
        assert_eq!(parent.children.as_deref(), Some(&["var1.a".to_string()][..]));
        assert_eq!(table.get("var1.a").unwrap().value.as_deref(), Some("5"));
        assert!(!table.contains("var1.b"));
        assert!(matches!(
            table.set_children("nope", Vec::new()),
            Err(SessionError::UnknownVariable(_))
        ));
    }

    #[test]
    fn table_remove_tree() {
        let mut table = VarTable::new();
        table.insert(var("var1", "{...}"));
        table.insert(var("var10", "3"));
        table
            .set_children("var1", vec![var("var1.a", "1")])
            .unwrap();
        table
            .set_children("var1.a", vec![var("var1.a.x", "1")])
            .unwrap();

        let removed = table.remove_tree("var1");
        assert_eq!(removed, vec!["var1", "var1.a", "var1.a.x"]);
        assert!(table.contains("var10"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn table_child_by_expression() {
        let mut table = VarTable::new();
        table.insert(var("var1", "{...}"));
        let mut first = var("var1.first", "1");
        first.expression = "first".into();
        table.set_children("var1", vec![first]).unwrap();
        assert_eq!(
            table.child_by_expression("var1", "first").map(|v| v.name.as_str()),
            Some("var1.first")
        );
        assert!(table.child_by_expression("var1", "second").is_none());
    }
}
