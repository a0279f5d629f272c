//! Watch registration and refresh.
//!
//! Registering a watch creates the variable objects its decoder needs,
//! recursively for nested containers. After that a watch is re-decoded
//! from cached values whenever one of its variables changes, and its
//! derived structure is rebuilt when a vector length, a map size or a tree
//! link changes.
//!
//! Every build step records the root objects it creates. If registration
//! fails part way, those objects are deleted again so the debugger's table
//! never holds objects the client has lost track of.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;

use crate::error::SessionError;
use crate::event::SessionEvent;
use crate::session::{lock, Session};
use crate::typename::CppType;
use crate::varobj::VarObject;
use crate::watch::{
    classify, map_count_expr, map_node_member_expr, map_root_expr, pair_member_expr,
    parse_address, parse_int, string_chars_expr, tree_child_expr, vector_array_expr,
    vector_length_expr, Decoder, MapNode, NativeValue, TypeClass, TypedWatch, WatchId,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

impl Session {
    /// Register a typed watch on `expression` and publish its first value.
    pub async fn add_watch(&self, expression: &str) -> Result<WatchId, SessionError> {
        let mut created = Vec::new();
        let watch = match self.derived_watch(expression.to_string(), &mut created).await {
            Ok(watch) => watch,
            Err(e) => {
                self.discard_vars(&created).await;
                return Err(e);
            }
        };
        let id = self.inner.next_watch.fetch_add(1, Ordering::Relaxed);
        let value = watch.decode(&lock(&self.inner.vars));
        lock(&self.inner.watches).insert(id, watch);
        tracing::debug!("watch {} on {}", id, expression);
        self.emit(SessionEvent::WatchDecoded { id, value });
        Ok(id)
    }

    /// Unregister a watch and delete every variable object it created.
    ///
    /// Returns false for an unknown id.
    pub async fn remove_watch(&self, id: WatchId) -> Result<bool, SessionError> {
        let Some(watch) = lock(&self.inner.watches).remove(id) else {
            return Ok(false);
        };
        let mut first_error = None;
        let roots = std::iter::once(watch.var.clone()).chain(watch.derived_roots());
        for root in roots {
            if let Err(e) = self.var_delete(&root).await {
                tracing::warn!("deleting {} failed: {}", root, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }

    /// Decode a watch from the cached values.
    pub fn watch_value(&self, id: WatchId) -> Option<NativeValue> {
        let watch = lock(&self.inner.watches).get(id).cloned()?;
        let value = watch.decode(&lock(&self.inner.vars));
        Some(value)
    }

    /// Registered watches with their expressions.
    pub fn watches(&self) -> Vec<(WatchId, String)> {
        let watches = lock(&self.inner.watches);
        watches
            .ids()
            .into_iter()
            .filter_map(|id| watches.get(id).map(|w| (id, w.expression.clone())))
            .collect()
    }

    /// Rebuild and re-decode the watches reading any of `changed`.
    pub(crate) async fn refresh_watches(&self, changed: &HashSet<String>) {
        let (restructured, mut affected) = {
            let watches = lock(&self.inner.watches);
            (watches.restructured_by(changed), watches.affected_by(changed))
        };
        for id in &restructured {
            if let Err(e) = self.rebuild_watch(*id).await {
                tracing::warn!("rebuilding watch {} failed: {}", id, e);
            }
            if !affected.contains(id) {
                affected.push(*id);
            }
        }
        affected.sort_unstable();
        for id in affected {
            if let Some(value) = self.watch_value(id) {
                self.emit(SessionEvent::WatchDecoded { id, value });
            }
        }
    }

    /// Drop a watch's derived variable objects and derive them again.
    async fn rebuild_watch(&self, id: WatchId) -> Result<(), SessionError> {
        let Some(old) = lock(&self.inner.watches).get(id).cloned() else {
            return Ok(());
        };
        for root in old.derived_roots() {
            if let Err(e) = self.var_delete(&root).await {
                tracing::debug!("deleting {} failed: {}", root, e);
            }
        }
        let var = self
            .var(&old.var)
            .ok_or_else(|| SessionError::UnknownVariable(old.var.clone()))?;
        let mut created = Vec::new();
        match self.build_for(var, old.expression.clone(), &mut created).await {
            Ok(rebuilt) => {
                lock(&self.inner.watches).insert(id, rebuilt);
                Ok(())
            }
            Err(e) => {
                self.discard_vars(&created).await;
                Err(e)
            }
        }
    }

    /// Delete objects created by a build that did not complete.
    async fn discard_vars(&self, names: &[String]) {
        for name in names.iter().rev() {
            self.discard_var(name).await;
        }
    }

    /// `var_create`, recording the new object in `created`.
    async fn create_tracked(
        &self,
        expression: &str,
        created: &mut Vec<String>,
    ) -> Result<VarObject, SessionError> {
        let var = self.var_create(expression).await?;
        created.push(var.name.clone());
        Ok(var)
    }

    /// Create a variable object for `expression` and a watch over it.
    fn derived_watch<'a>(
        &'a self,
        expression: String,
        created: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<TypedWatch, SessionError>> {
        Box::pin(async move {
            let var = self.create_tracked(&expression, created).await?;
            self.build_for(var, expression, created).await
        })
    }

    /// Choose a decoder for an existing variable object, creating the
    /// derived objects it needs.
    fn build_for<'a>(
        &'a self,
        var: VarObject,
        expression: String,
        created: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<TypedWatch, SessionError>> {
        Box::pin(async move {
            let class = var
                .type_name
                .as_deref()
                .map(classify)
                .unwrap_or(TypeClass::Opaque);
            let decoder = match class {
                TypeClass::Int => Decoder::Int,
                TypeClass::Char => Decoder::Char,
                TypeClass::CString => Decoder::CString,
                TypeClass::Opaque => Decoder::Opaque,
                TypeClass::Pointer { pointee } => Decoder::Pointer { pointee },
                TypeClass::Str => {
                    let chars = self
                        .create_tracked(&string_chars_expr(&expression), created)
                        .await?;
                    Decoder::Str { chars: chars.name }
                }
                TypeClass::Pair => {
                    let first = self
                        .derived_watch(pair_member_expr(&expression, "first"), created)
                        .await?;
                    let second = self
                        .derived_watch(pair_member_expr(&expression, "second"), created)
                        .await?;
                    Decoder::Pair {
                        first: Box::new(first),
                        second: Box::new(second),
                    }
                }
                TypeClass::Vector => self.build_vector(&expression, created).await?,
                TypeClass::Map { key, value } => {
                    self.build_map(&expression, &key, &value, created).await?
                }
            };
            Ok(TypedWatch::new(var.name, expression, decoder))
        })
    }

    async fn build_vector(
        &self,
        expression: &str,
        created: &mut Vec<String>,
    ) -> Result<Decoder, SessionError> {
        let length = self
            .create_tracked(&vector_length_expr(expression), created)
            .await?;
        let count = length
            .value
            .as_deref()
            .and_then(parse_int)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0)
            .min(self.inner.options.max_container_elements);
        if count == 0 {
            return Ok(Decoder::Vector {
                length: length.name,
                array: None,
                elements: Vec::new(),
            });
        }

        let array = self
            .create_tracked(&vector_array_expr(expression, count), created)
            .await?;
        let mut children = self.var_list_children(&array.name).await?;
        children.sort_by_key(|child| child.expression.parse::<usize>().unwrap_or(usize::MAX));
        let mut elements = Vec::with_capacity(children.len());
        for child in children {
            let path = child.path_expression.clone().unwrap_or_else(|| {
                format!("({expression})._M_impl._M_start[{}]", child.expression)
            });
            elements.push(self.build_for(child, path, created).await?);
        }
        Ok(Decoder::Vector {
            length: length.name,
            array: Some(array.name),
            elements,
        })
    }

    /// Walk the map's red-black tree in order through synthesized
    /// expressions. Best effort: a failed step keeps the nodes found so far
    /// and deletes whatever that step created.
    async fn build_map(
        &self,
        expression: &str,
        key: &CppType,
        value: &CppType,
        created: &mut Vec<String>,
    ) -> Result<Decoder, SessionError> {
        let count = self
            .create_tracked(&map_count_expr(expression), created)
            .await?;
        let mut links = Vec::new();
        let mut nodes = Vec::new();
        let mut walked = Vec::new();
        let walk = self
            .walk_tree(expression, key, value, &mut links, &mut nodes, &mut walked)
            .await;
        let decoder = Decoder::Map {
            count: count.name,
            links,
            nodes,
        };
        if let Err(e) = walk {
            tracing::warn!("walking {} stopped early: {}", expression, e);
            let kept: HashSet<String> = decoder.derived_roots().into_iter().collect();
            let (used, orphans): (Vec<String>, Vec<String>) =
                walked.into_iter().partition(|name| kept.contains(name));
            self.discard_vars(&orphans).await;
            walked = used;
        }
        created.extend(walked);
        Ok(decoder)
    }

    async fn walk_tree(
        &self,
        expression: &str,
        key: &CppType,
        value: &CppType,
        links: &mut Vec<String>,
        nodes: &mut Vec<MapNode>,
        created: &mut Vec<String>,
    ) -> Result<(), SessionError> {
        let max = self.inner.options.max_container_elements;
        let mut current = self
            .tree_link(&map_root_expr(expression), links, created)
            .await?;
        let mut stack: Vec<u64> = Vec::new();
        let mut visited: HashSet<u64> = HashSet::new();

        while nodes.len() < max {
            // A null address ends the descent; never cast it to a node.
            while let Some(address) = current {
                if address == 0 || !visited.insert(address) {
                    break;
                }
                stack.push(address);
                current = self
                    .tree_link(&tree_child_expr(address, "left"), links, created)
                    .await?;
            }
            let Some(address) = stack.pop() else {
                break;
            };
            let key_watch = self
                .derived_watch(map_node_member_expr(address, key, value, "first"), created)
                .await?;
            let value_watch = self
                .derived_watch(map_node_member_expr(address, key, value, "second"), created)
                .await?;
            nodes.push(MapNode {
                address,
                key: key_watch,
                value: value_watch,
            });
            current = self
                .tree_link(&tree_child_expr(address, "right"), links, created)
                .await?;
        }
        Ok(())
    }

    /// Create a variable object for a tree pointer and read its address.
    async fn tree_link(
        &self,
        expression: &str,
        links: &mut Vec<String>,
        created: &mut Vec<String>,
    ) -> Result<Option<u64>, SessionError> {
        let link = self.create_tracked(expression, created).await?;
        let address = link.value.as_deref().and_then(parse_address);
        links.push(link.name);
        Ok(address)
    }
}
