//! Navigation graph: step registration and prerequisite resolution
//!
//! Steps are registered per entity type under a name. Each step names at most
//! one prerequisite, either a sibling step on the same entity or a step on a
//! related entity reached through a typed accessor. Resolving a step walks the
//! prerequisite chain to its root, runs every transition on the way back and
//! verifies each landed view.
//!
//! Every call resolves the chain afresh; nothing is remembered between calls,
//! so transitions must cope with the UI already being where they lead.

use applab_common::{wait_for, WaitError, WaitOptions};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{NavResult, NavigationError};
use crate::view::{NavParams, View};

/// Type-erased entity being navigated for
pub type AnyEntity = dyn Any + Send + Sync;

type Accessor = Arc<dyn Fn(&AnyEntity) -> NavResult<Arc<AnyEntity>> + Send + Sync>;

/// Where a step's prerequisite view comes from
pub enum Prerequisite<E> {
    /// Root step
    None,
    /// Another step on the same entity
    Sibling(String),
    /// A step on an entity related to this one
    Related(Related<E>),
}

pub struct Related<E> {
    accessor: Arc<dyn Fn(&E) -> Arc<AnyEntity> + Send + Sync>,
    entity: TypeId,
    entity_name: &'static str,
    step: String,
}

impl<E: 'static> Prerequisite<E> {
    pub fn sibling(step: impl Into<String>) -> Self {
        Prerequisite::Sibling(step.into())
    }

    /// Resolve `step` on the entity returned by `accessor`, e.g. a service's
    /// server for its login page
    pub fn related<R, F>(accessor: F, step: impl Into<String>) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(&E) -> Arc<R> + Send + Sync + 'static,
    {
        Prerequisite::Related(Related {
            accessor: Arc::new(move |entity: &E| -> Arc<AnyEntity> { accessor(entity) }),
            entity: TypeId::of::<R>(),
            entity_name: type_name::<R>(),
            step: step.into(),
        })
    }
}

/// Borrowed inputs of one transition
pub struct StepContext<'a, D, E> {
    pub driver: &'a D,
    pub entity: &'a E,
    /// View produced by the prerequisite, `None` for root steps
    pub prerequisite_view: Option<&'a (dyn View + 'static)>,
    pub params: &'a NavParams,
}

impl<'a, D, E> StepContext<'a, D, E> {
    /// The prerequisite view as its concrete type
    pub fn prerequisite<V: View>(&self) -> NavResult<&'a V> {
        let view = self.prerequisite_view.ok_or_else(|| NavigationError::ViewMismatch {
            expected: type_name::<V>(),
            actual: "no prerequisite view",
        })?;
        view.downcast_ref::<V>().ok_or_else(|| NavigationError::ViewMismatch {
            expected: type_name::<V>(),
            actual: view.view_name(),
        })
    }
}

/// A named transition that lands on a view for one entity type
#[async_trait]
pub trait NavigateStep<D: Send + Sync + 'static>: Send + Sync + 'static {
    type Entity: Send + Sync + 'static;

    fn prerequisite(&self) -> Prerequisite<Self::Entity> {
        Prerequisite::None
    }

    /// The view this step lands on
    fn view(&self, driver: &D, entity: &Self::Entity) -> Box<dyn View>;

    /// Perform the UI action that leads from the prerequisite view to this one
    async fn step(&self, cx: StepContext<'_, D, Self::Entity>) -> NavResult<()>;
}

trait ErasedStep<D>: Send + Sync {
    fn view(&self, driver: &D, entity: &AnyEntity) -> NavResult<Box<dyn View>>;

    fn run<'a>(
        &'a self,
        driver: &'a D,
        entity: &'a AnyEntity,
        prerequisite_view: Option<&'a (dyn View + 'static)>,
        params: &'a NavParams,
    ) -> BoxFuture<'a, NavResult<()>>;
}

struct Erased<S>(S);

impl<D, S> ErasedStep<D> for Erased<S>
where
    D: Send + Sync + 'static,
    S: NavigateStep<D>,
{
    fn view(&self, driver: &D, entity: &AnyEntity) -> NavResult<Box<dyn View>> {
        let entity = downcast_entity::<S::Entity>(entity, "view")?;
        Ok(self.0.view(driver, entity))
    }

    fn run<'a>(
        &'a self,
        driver: &'a D,
        entity: &'a AnyEntity,
        prerequisite_view: Option<&'a (dyn View + 'static)>,
        params: &'a NavParams,
    ) -> BoxFuture<'a, NavResult<()>> {
        Box::pin(async move {
            let entity = downcast_entity::<S::Entity>(entity, "step")?;
            self.0
                .step(StepContext {
                    driver,
                    entity,
                    prerequisite_view,
                    params,
                })
                .await
        })
    }
}

fn downcast_entity<'a, E: 'static>(entity: &'a AnyEntity, step: &str) -> NavResult<&'a E> {
    entity
        .downcast_ref::<E>()
        .ok_or_else(|| NavigationError::EntityMismatch {
            step: step.to_string(),
            expected: type_name::<E>(),
            actual: "another entity type",
        })
}

/// Last path segment of a type name
fn short_name(name: &'static str) -> &'static str {
    name.rsplit("::").next().unwrap_or(name)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StepKey {
    entity: TypeId,
    name: String,
}

struct Edge {
    target: StepKey,
    hop: Option<Accessor>,
}

struct Registered<D> {
    entity_name: &'static str,
    prerequisite: Option<Edge>,
    step: Box<dyn ErasedStep<D>>,
}

/// All known steps, keyed by entity type and step name
pub struct StepRegistry<D> {
    steps: HashMap<StepKey, Registered<D>>,
    names: HashMap<TypeId, &'static str>,
}

impl<D> Default for StepRegistry<D> {
    fn default() -> Self {
        Self {
            steps: HashMap::new(),
            names: HashMap::new(),
        }
    }
}

impl<D: Send + Sync + 'static> StepRegistry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `step` under `name` for its entity type
    pub fn register<S>(&mut self, name: impl Into<String>, step: S) -> NavResult<&mut Self>
    where
        S: NavigateStep<D>,
    {
        let name = name.into();
        let entity = TypeId::of::<S::Entity>();
        let entity_name = type_name::<S::Entity>();
        let key = StepKey {
            entity,
            name: name.clone(),
        };

        if self.steps.contains_key(&key) {
            return Err(NavigationError::DuplicateStep {
                entity: short_name(entity_name).to_string(),
                step: name,
            });
        }

        let prerequisite = match step.prerequisite() {
            Prerequisite::None => None,
            Prerequisite::Sibling(target) => Some(Edge {
                target: StepKey { entity, name: target },
                hop: None,
            }),
            Prerequisite::Related(related) => {
                let Related {
                    accessor,
                    entity: target_entity,
                    entity_name: target_name,
                    step: target,
                } = related;
                self.names.entry(target_entity).or_insert(target_name);
                let hop: Accessor = Arc::new(move |current: &AnyEntity| -> NavResult<Arc<AnyEntity>> {
                    let current = downcast_entity::<S::Entity>(current, "prerequisite")?;
                    Ok((*accessor)(current))
                });
                Some(Edge {
                    target: StepKey {
                        entity: target_entity,
                        name: target,
                    },
                    hop: Some(hop),
                })
            }
        };

        debug!("Registered step {}::{}", short_name(entity_name), name);
        self.names.insert(entity, entity_name);
        self.steps.insert(
            key,
            Registered {
                entity_name,
                prerequisite,
                step: Box::new(Erased(step)),
            },
        );
        Ok(self)
    }
}

impl<D> StepRegistry<D> {
    pub fn contains<E: 'static>(&self, step: &str) -> bool {
        self.steps.contains_key(&StepKey {
            entity: TypeId::of::<E>(),
            name: step.to_string(),
        })
    }

    /// Step names registered for `E`, sorted
    pub fn steps_for<E: 'static>(&self) -> Vec<&str> {
        let entity = TypeId::of::<E>();
        let mut names: Vec<&str> = self
            .steps
            .keys()
            .filter(|k| k.entity == entity)
            .map(|k| k.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn label(&self, key: &StepKey) -> String {
        let entity = self.names.get(&key.entity).copied().unwrap_or("<unregistered>");
        format!("{}::{}", short_name(entity), key.name)
    }

    fn unknown(&self, key: &StepKey) -> NavigationError {
        NavigationError::UnknownStep {
            entity: short_name(self.names.get(&key.entity).copied().unwrap_or("<unregistered>")).to_string(),
            step: key.name.clone(),
        }
    }

    /// Check that every prerequisite exists and that no chain loops
    pub fn validate(&self) -> NavResult<()> {
        let mut keys: Vec<&StepKey> = self.steps.keys().collect();
        keys.sort_by_key(|k| self.label(k));

        for key in &keys {
            if let Some(edge) = &self.steps[*key].prerequisite {
                if !self.steps.contains_key(&edge.target) {
                    return Err(self.unknown(&edge.target));
                }
            }
        }

        // each step has at most one outgoing edge, so following it from every
        // start either ends at a root or revisits a step
        for start in keys {
            let mut seen: Vec<&StepKey> = vec![start];
            let mut current = start;
            while let Some(edge) = self.steps.get(current).and_then(|r| r.prerequisite.as_ref()) {
                if let Some(pos) = seen.iter().position(|k| **k == edge.target) {
                    let mut chain: Vec<String> = seen[pos..].iter().map(|k| self.label(k)).collect();
                    chain.push(self.label(&edge.target));
                    return Err(NavigationError::CyclicPrerequisite { chain });
                }
                seen.push(&edge.target);
                current = &edge.target;
            }
        }

        Ok(())
    }
}

impl<D> fmt::Debug for StepRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut labels: Vec<String> = self.steps.keys().map(|k| self.label(k)).collect();
        labels.sort();
        f.debug_struct("StepRegistry").field("steps", &labels).finish()
    }
}

/// Outcome of a traced navigation
pub struct Navigation {
    pub view: Box<dyn View>,
    /// Steps whose transitions ran, in execution order, as `Entity::Step`
    pub trace: Vec<String>,
}

#[derive(Default)]
struct ResolutionContext {
    chain: Vec<StepKey>,
    executed: Vec<String>,
}

/// Resolves steps against a validated registry
pub struct Navigator<D> {
    registry: StepRegistry<D>,
    driver: D,
    verify: WaitOptions,
}

impl<D: Send + Sync + 'static> Navigator<D> {
    /// `verify` bounds how long a landed view may take to report itself
    /// displayed
    pub fn new(registry: StepRegistry<D>, driver: D, verify: WaitOptions) -> NavResult<Self> {
        registry.validate()?;
        Ok(Self {
            registry,
            driver,
            verify: verify.handle_exception(true),
        })
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn registry(&self) -> &StepRegistry<D> {
        &self.registry
    }

    pub async fn navigate_to<E>(&self, entity: &E, step: &str, params: NavParams) -> NavResult<Box<dyn View>>
    where
        E: Send + Sync + 'static,
    {
        Ok(self.navigate_traced(entity, step, params).await?.view)
    }

    /// Navigate and hand back the landed view as `V`
    pub async fn navigate_to_view<E, V>(&self, entity: &E, step: &str, params: NavParams) -> NavResult<Box<V>>
    where
        E: Send + Sync + 'static,
        V: View,
    {
        self.navigate_to(entity, step, params).await?.downcast::<V>()
    }

    /// Navigate and also report which transitions ran
    pub async fn navigate_traced<E>(&self, entity: &E, step: &str, params: NavParams) -> NavResult<Navigation>
    where
        E: Send + Sync + 'static,
    {
        let key = StepKey {
            entity: TypeId::of::<E>(),
            name: step.to_string(),
        };
        if !self.registry.steps.contains_key(&key) {
            return Err(NavigationError::UnknownStep {
                entity: short_name(type_name::<E>()).to_string(),
                step: step.to_string(),
            });
        }

        let mut cx = ResolutionContext::default();
        let view = self.resolve(&key, entity, &params, &mut cx).await?;
        Ok(Navigation {
            view,
            trace: cx.executed,
        })
    }

    fn resolve<'a>(
        &'a self,
        key: &'a StepKey,
        entity: &'a AnyEntity,
        params: &'a NavParams,
        cx: &'a mut ResolutionContext,
    ) -> BoxFuture<'a, NavResult<Box<dyn View>>> {
        Box::pin(async move {
            let label = self.registry.label(key);
            let registered = self.registry.steps.get(key).ok_or_else(|| self.registry.unknown(key))?;

            if cx.chain.contains(key) {
                let mut chain: Vec<String> = cx.chain.iter().map(|k| self.registry.label(k)).collect();
                chain.push(label);
                return Err(NavigationError::CyclicPrerequisite { chain });
            }

            debug!("{}: unresolved", label);
            cx.chain.push(key.clone());
            let outcome = self.execute(registered, &label, entity, params, cx).await;
            cx.chain.pop();

            match &outcome {
                Ok(view) => debug!("{}: resolved at {}", label, short_name(view.view_name())),
                Err(e) => debug!("{}: failed: {}", label, e),
            }
            outcome
        })
    }

    async fn execute(
        &self,
        registered: &Registered<D>,
        label: &str,
        entity: &AnyEntity,
        params: &NavParams,
        cx: &mut ResolutionContext,
    ) -> NavResult<Box<dyn View>> {
        let prerequisite_view = match &registered.prerequisite {
            None => None,
            Some(edge) => {
                debug!("{}: resolving prerequisite {}", label, self.registry.label(&edge.target));
                let view = match &edge.hop {
                    None => self.resolve(&edge.target, entity, params, cx).await?,
                    Some(hop) => {
                        let related = (**hop)(entity)?;
                        self.resolve(&edge.target, &*related, params, cx).await?
                    }
                };
                Some(view)
            }
        };

        let step_name = label.rsplit("::").next().unwrap_or(label).to_string();
        let entity_name = short_name(registered.entity_name).to_string();

        debug!("{}: executing transition", label);
        registered
            .step
            .run(&self.driver, entity, prerequisite_view.as_deref(), params)
            .await
            .map_err(|e| NavigationError::StepFailed {
                entity: entity_name.clone(),
                step: step_name.clone(),
                source: Box::new(e),
            })?;
        cx.executed.push(label.to_string());

        debug!("{}: verifying", label);
        let view = registered.step.view(&self.driver, entity)?;
        self.verify(&*view, entity_name, step_name).await?;
        Ok(view)
    }

    async fn verify(&self, view: &dyn View, entity: String, step: String) -> NavResult<()> {
        let options = self
            .verify
            .clone()
            .message(format!("{} to be displayed", short_name(view.view_name())));

        match wait_for(&options, move || view.is_displayed()).await {
            Ok(_) => Ok(()),
            Err(WaitError::Predicate(e)) => Err(e),
            Err(WaitError::Timeout {
                elapsed, last_error, ..
            }) => {
                let mut reason = format!("{} not displayed after {:?}", short_name(view.view_name()), elapsed);
                if let Some(err) = last_error {
                    reason.push_str(&format!(" (last error: {})", err));
                }
                Err(NavigationError::NavigationFailed { entity, step, reason })
            }
        }
    }
}
