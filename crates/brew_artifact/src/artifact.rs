//! Eager and lazily evaluated artifacts.

use std::fmt;
use std::sync::Arc;

use brew_common::Fingerprint;

use crate::error::ArtifactError;

/// Error type returned by lazy evaluators.
pub type EvalError = Box<dyn std::error::Error + Send + Sync>;

/// Deferred computation producing an artifact's value from its name.
pub type Evaluator<T> = Arc<dyn Fn(&str) -> Result<T, EvalError> + Send + Sync>;

/// Builds the conventional `"<domain>##<split>##<feature>"` artifact name.
pub fn artifact_name(domain: &str, split: &str, feature: &str) -> String {
    format!("{domain}##{split}##{feature}")
}

/// How an artifact obtains its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The value is held in the artifact.
    Eager,
    /// The value is produced by the evaluator on every read.
    Lazy,
}

enum Payload<T> {
    Eager(Option<Arc<T>>),
    Lazy {
        fingerprint: Fingerprint,
        evaluate: Evaluator<T>,
    },
}

impl<T> Clone for Payload<T> {
    fn clone(&self) -> Self {
        match self {
            Payload::Eager(value) => Payload::Eager(value.clone()),
            Payload::Lazy {
                fingerprint,
                evaluate,
            } => Payload::Lazy {
                fingerprint: *fingerprint,
                evaluate: Arc::clone(evaluate),
            },
        }
    }
}

/// A named handle to data flowing between pipeline stages.
///
/// Eager artifacts behave like a mutable slot. Lazy artifacts carry the
/// fingerprint of the inputs they were derived from and an evaluator that is
/// called with the artifact's name on every [`value`](Self::value) read. The
/// result is never cached inside the artifact; callers that want to avoid
/// repeated work consult the state store before reading.
pub struct Artifact<T> {
    name: String,
    payload: Payload<T>,
}

impl<T> Artifact<T> {
    /// Creates an eager artifact with no value set.
    pub fn eager(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Payload::Eager(None),
        }
    }

    /// Creates an eager artifact holding `value`.
    pub fn with_value(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            payload: Payload::Eager(Some(Arc::new(value))),
        }
    }

    /// Creates a lazy artifact.
    ///
    /// Equivalent to the builder with both parts supplied; fails with
    /// [`ArtifactError::Configuration`] when either is `None`.
    pub fn lazy<F>(
        name: impl Into<String>,
        fingerprint: Option<Fingerprint>,
        evaluate: Option<F>,
    ) -> Result<Self, ArtifactError>
    where
        F: Fn(&str) -> Result<T, EvalError> + Send + Sync + 'static,
    {
        let mut builder = ArtifactBuilder::new(name).lazy();
        if let Some(fp) = fingerprint {
            builder = builder.fingerprint(fp);
        }
        if let Some(f) = evaluate {
            builder = builder.evaluator(f);
        }
        builder.build()
    }

    /// Starts a builder for an artifact called `name`.
    pub fn builder(name: impl Into<String>) -> ArtifactBuilder<T> {
        ArtifactBuilder::new(name)
    }

    /// Returns the artifact name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether the value is held or evaluated on read.
    pub fn mode(&self) -> Mode {
        match self.payload {
            Payload::Eager(_) => Mode::Eager,
            Payload::Lazy { .. } => Mode::Lazy,
        }
    }

    /// Returns `true` for lazy artifacts.
    pub fn is_lazy(&self) -> bool {
        self.mode() == Mode::Lazy
    }

    /// Returns the input fingerprint of a lazy artifact, `None` for eager ones.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        match &self.payload {
            Payload::Eager(_) => None,
            Payload::Lazy { fingerprint, .. } => Some(*fingerprint),
        }
    }

    /// Reads the artifact's value.
    ///
    /// For eager artifacts this returns the stored value, or `None` if it was
    /// never set. For lazy artifacts the evaluator runs on every call, which
    /// may perform I/O or heavy computation.
    pub fn value(&self) -> Result<Option<Arc<T>>, ArtifactError> {
        match &self.payload {
            Payload::Eager(value) => Ok(value.clone()),
            Payload::Lazy { evaluate, .. } => {
                tracing::debug!(artifact = %self.name, "evaluating lazy artifact");
                let value =
                    evaluate(self.name.as_str()).map_err(|source| ArtifactError::Evaluation {
                        name: self.name.clone(),
                        source,
                    })?;
                Ok(Some(Arc::new(value)))
            }
        }
    }

    /// Stores `value` in an eager artifact.
    ///
    /// Lazy artifacts reject assignment with [`ArtifactError::InvalidOperation`].
    pub fn set_value(&mut self, value: T) -> Result<(), ArtifactError> {
        match &mut self.payload {
            Payload::Eager(slot) => {
                *slot = Some(Arc::new(value));
                Ok(())
            }
            Payload::Lazy { .. } => Err(ArtifactError::InvalidOperation {
                name: self.name.clone(),
            }),
        }
    }
}

impl<T> Clone for Artifact<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            payload: self.payload.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Artifact<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Artifact");
        s.field("name", &self.name);
        match &self.payload {
            Payload::Eager(value) => s.field("value", value),
            Payload::Lazy { fingerprint, .. } => s.field("fingerprint", fingerprint),
        };
        s.finish_non_exhaustive()
    }
}

/// Step-by-step construction of an [`Artifact`].
///
/// Lazy artifacts must receive both a fingerprint and an evaluator before
/// [`build`](Self::build); otherwise the build fails with
/// [`ArtifactError::Configuration`].
pub struct ArtifactBuilder<T> {
    name: String,
    mode: Mode,
    fingerprint: Option<Fingerprint>,
    evaluate: Option<Evaluator<T>>,
    value: Option<T>,
}

impl<T> ArtifactBuilder<T> {
    /// Starts building an eager artifact called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Eager,
            fingerprint: None,
            evaluate: None,
            value: None,
        }
    }

    /// Switches the artifact to lazy evaluation.
    pub fn lazy(mut self) -> Self {
        self.mode = Mode::Lazy;
        self
    }

    /// Sets the input fingerprint.
    pub fn fingerprint(mut self, fingerprint: impl Into<Fingerprint>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Sets the evaluator called on every read of a lazy artifact.
    pub fn evaluator<F>(mut self, evaluate: F) -> Self
    where
        F: Fn(&str) -> Result<T, EvalError> + Send + Sync + 'static,
    {
        self.evaluate = Some(Arc::new(evaluate));
        self
    }

    /// Sets an initial value for an eager artifact.
    pub fn value(mut self, value: T) -> Self {
        self.value = Some(value);
        self
    }

    /// Finishes the artifact.
    pub fn build(self) -> Result<Artifact<T>, ArtifactError> {
        match self.mode {
            Mode::Eager => {
                if self.evaluate.is_some() {
                    tracing::debug!(artifact = %self.name, "evaluator ignored on eager artifact");
                }
                Ok(Artifact {
                    name: self.name,
                    payload: Payload::Eager(self.value.map(Arc::new)),
                })
            }
            Mode::Lazy => match (self.fingerprint, self.evaluate) {
                (Some(fingerprint), Some(evaluate)) => Ok(Artifact {
                    name: self.name,
                    payload: Payload::Lazy {
                        fingerprint,
                        evaluate,
                    },
                }),
                (fingerprint, evaluate) => {
                    let missing = match (fingerprint.is_none(), evaluate.is_none()) {
                        (true, true) => "a fingerprint and an evaluator",
                        (true, false) => "a fingerprint",
                        _ => "an evaluator",
                    };
                    Err(ArtifactError::Configuration {
                        name: self.name,
                        missing: missing.to_string(),
                    })
                }
            },
        }
    }
}
