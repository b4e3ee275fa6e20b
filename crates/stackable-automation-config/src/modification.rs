use crate::config::AutomationConfig;

/// A deferred mutation of the [`AutomationConfig`].
///
/// Implementations must not perform I/O and must not fail. Applying the same
/// modification repeatedly to the same starting document always yields the
/// same result. Every closure taking `&mut AutomationConfig` is a
/// modification.
pub trait Modification {
    fn apply_to(&self, config: &mut AutomationConfig);

    /// Whether applying this modification leaves every document untouched.
    fn is_noop(&self) -> bool {
        false
    }
}

pub type BoxedModification = Box<dyn Modification + Send + Sync>;

/// The canonical modification which does nothing.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Noop;

impl Modification for Noop {
    fn apply_to(&self, _config: &mut AutomationConfig) {}

    fn is_noop(&self) -> bool {
        true
    }
}

impl<F> Modification for F
where
    F: Fn(&mut AutomationConfig),
{
    fn apply_to(&self, config: &mut AutomationConfig) {
        self(config);
    }
}

impl Modification for BoxedModification {
    fn apply_to(&self, config: &mut AutomationConfig) {
        (**self).apply_to(config);
    }

    fn is_noop(&self) -> bool {
        (**self).is_noop()
    }
}

/// An ordered sequence of pending modifications.
///
/// The modifications are applied in insertion order, later ones see the
/// effects of earlier ones.
#[derive(Default)]
pub struct Modifications(Vec<BoxedModification>);

impl Modifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, modification: impl Modification + Send + Sync + 'static) -> &mut Self {
        self.0.push(Box::new(modification));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Modification for Modifications {
    fn apply_to(&self, config: &mut AutomationConfig) {
        for modification in &self.0 {
            modification.apply_to(config);
        }
    }

    fn is_noop(&self) -> bool {
        self.0.iter().all(|modification| modification.is_noop())
    }
}

impl FromIterator<BoxedModification> for Modifications {
    fn from_iter<T: IntoIterator<Item = BoxedModification>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::fmt::Debug for Modifications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Modifications")
            .field("len", &self.0.len())
            .finish()
    }
}
