use crate::jvm::{Class, Remapper};

use super::{
    ApplyReport, MixinClass,
    context::{HandlerContext, TransformerConfig},
    errors::{ApplyError, MixinWarning, ParseError},
};

/// Applies a set of mixins to target classes.
///
/// The transformer is immutable once its mixins are registered. Each call to
/// [`MixinTransformer::transform`] runs its own pass, so different classes may be transformed
/// from several threads at once.
#[derive(Debug, Clone, Default)]
pub struct MixinTransformer {
    config: TransformerConfig,
    remapper: Remapper,
    mixins: Vec<MixinClass>,
}

/// The outcome of transforming one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformReport {
    /// The binary name of the transformed class.
    pub target: String,
    /// The mixins that were applied, in application order.
    pub applied: Vec<ApplyReport>,
    /// The mixins that failed, with their errors. Those left the class untouched.
    pub failures: Vec<(String, ApplyError)>,
}

impl TransformReport {
    /// Iterates over the warnings of every applied mixin.
    pub fn warnings(&self) -> impl Iterator<Item = &MixinWarning> {
        self.applied.iter().flat_map(ApplyReport::warnings)
    }

    /// Checks if every mixin targeting the class was applied.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl MixinTransformer {
    /// Creates a transformer without mixins.
    #[must_use]
    pub fn new(config: TransformerConfig) -> Self {
        Self {
            config,
            remapper: Remapper::new(),
            mixins: Vec::new(),
        }
    }

    /// Sets the table translating names used by mixins into names used by targets.
    #[must_use]
    pub fn with_remapper(mut self, remapper: Remapper) -> Self {
        self.remapper = remapper;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &TransformerConfig {
        &self.config
    }

    /// Parses and registers a mixin class.
    /// # Errors
    /// See [`ParseError`]. The mixin is not registered then.
    pub fn add_mixin(&mut self, class: Class) -> Result<(), ParseError> {
        let mixin = MixinClass::parse(class)?;
        log::debug!(
            "Registered mixin {} targeting {:?} with priority {}",
            mixin.name(),
            mixin.targets(),
            mixin.priority()
        );
        // Equal priorities keep registration order.
        let position = self
            .mixins
            .partition_point(|it| it.priority() <= mixin.priority());
        self.mixins.insert(position, mixin);
        Ok(())
    }

    /// Returns the registered mixins, in application order.
    #[must_use]
    pub fn mixins(&self) -> &[MixinClass] {
        &self.mixins
    }

    /// Applies every mixin targeting `target`, in ascending priority.
    /// A failing mixin is recorded in the report and does not stop the others.
    pub fn transform(&self, target: &mut Class) -> TransformReport {
        let mut ctx = HandlerContext::new(target, &self.config);
        let name = target.binary_name.clone();
        let mut report = TransformReport {
            target: name.clone(),
            applied: Vec::new(),
            failures: Vec::new(),
        };
        for mixin in self.mixins.iter().filter(|it| it.applies_to(&name, &self.remapper)) {
            match mixin.apply_to(target, &self.remapper, &mut ctx) {
                Ok(applied) => report.applied.push(applied),
                Err(err) => {
                    log::error!("Failed to apply mixin {}: {err}", mixin.name());
                    report.failures.push((mixin.name().to_owned(), err));
                }
            }
        }
        report
    }
}
