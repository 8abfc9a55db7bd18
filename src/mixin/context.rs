use crate::jvm::{
    Class,
    code::{Label, LabelAllocator},
};

use super::directive::DirectiveKind;

/// Settings shared by every application pass of a [`MixinTransformer`](super::MixinTransformer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformerConfig {
    /// The prefix of the names of generated handler methods.
    pub handler_prefix: String,
    /// Whether a redirect handler must take the receiver and the arguments of the redirected
    /// call and return its return type.
    pub verify_redirect_signatures: bool,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            handler_prefix: "$mokamix$".to_owned(),
            verify_redirect_signatures: true,
        }
    }
}

/// The state of one application pass over one target class.
///
/// Generated names and labels are unique within the pass. Passes over different classes
/// share nothing and may run in parallel.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    config: TransformerConfig,
    counter: u32,
    labels: LabelAllocator,
}

impl HandlerContext {
    /// Starts a pass over `target`. Fresh labels are greater than every label used in it.
    #[must_use]
    pub fn new(target: &Class, config: &TransformerConfig) -> Self {
        Self {
            config: config.clone(),
            counter: 0,
            labels: LabelAllocator::starting_after(target.labels()),
        }
    }

    /// Returns the configuration of the pass.
    #[must_use]
    pub fn config(&self) -> &TransformerConfig {
        &self.config
    }

    /// Generates the next member name, `<prefix><counter>$<kind>$<original>`.
    pub fn next_name(&mut self, kind: impl std::fmt::Display, original: &str) -> String {
        let name = format!(
            "{}{}${kind}${original}",
            self.config.handler_prefix, self.counter
        );
        self.counter += 1;
        name
    }

    /// Generates the name of a handler copy.
    pub fn next_handler_name(&mut self, kind: DirectiveKind, original: &str) -> String {
        self.next_name(kind, original)
    }

    /// Allocates a label that is unused in the target class.
    pub fn fresh_label(&mut self) -> Label {
        self.labels.fresh()
    }

    /// Returns the label allocator of the pass.
    pub fn labels_mut(&mut self) -> &mut LabelAllocator {
        &mut self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::class::ClassAccessFlags;

    #[test]
    fn handler_names_are_counted() {
        let target = Class::new("org/example/Target", ClassAccessFlags::PUBLIC);
        let mut ctx = HandlerContext::new(&target, &TransformerConfig::default());
        assert_eq!(
            ctx.next_handler_name(DirectiveKind::Redirect, "onHelper"),
            "$mokamix$0$redirect$onHelper"
        );
        assert_eq!(
            ctx.next_handler_name(DirectiveKind::Inject, "onHead"),
            "$mokamix$1$inject$onHead"
        );
    }
}
