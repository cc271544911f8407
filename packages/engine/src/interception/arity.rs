// packages/engine/src/interception/arity.rs
//! Arity ranges derived from declared parameter shapes
//!
//! | parameter            | min | max        |
//! |----------------------|-----|------------|
//! | required positional  | +1  | +1         |
//! | optional positional  |     | +1         |
//! | rest                 |     | unbounded  |
//! | any keyword          | +1 if a keyword is mandatory and no keyword-rest | +1 |

use crate::runtime::method::{ParamKind, Signature};
use crate::utils::errors::{EngineError, Result};
use std::fmt;

/// Inclusive `[min, max]` argument-count range; `max == None` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArityRange {
    pub min: usize,
    pub max: Option<usize>,
}

impl ArityRange {
    pub fn new(min: usize, max: Option<usize>) -> Self {
        Self { min, max }
    }

    /// Range accepting any argument count
    pub fn any() -> Self {
        Self { min: 0, max: None }
    }

    /// Compute the range for a signature
    pub fn of(signature: &Signature) -> Self {
        let mut min = 0;
        let mut max = Some(0);
        let mut has_keywords = false;
        let mut keyword_required = false;
        let mut keyword_rest = false;

        for param in signature.params() {
            match param.kind {
                ParamKind::Required => {
                    min += 1;
                    max = max.map(|m| m + 1);
                }
                ParamKind::Optional => max = max.map(|m| m + 1),
                ParamKind::Rest => max = None,
                ParamKind::KeyRequired => {
                    has_keywords = true;
                    keyword_required = true;
                }
                ParamKind::KeyOptional => has_keywords = true,
                ParamKind::KeyRest => {
                    has_keywords = true;
                    keyword_rest = true;
                }
                ParamKind::Block => {}
            }
        }

        if has_keywords {
            if keyword_required && !keyword_rest {
                min += 1;
            }
            max = max.map(|m| m + 1);
        }

        Self { min, max }
    }

    pub fn contains(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    /// Fail with an arity error unless `given` is in range
    pub fn check(&self, given: usize) -> Result<()> {
        if self.contains(given) {
            Ok(())
        } else {
            Err(EngineError::Arity {
                given,
                min: self.min,
                max: self.max,
            })
        }
    }

    /// Fail when a computed response needs more arguments than this range allows
    pub fn check_plan(&self, plan: &Signature) -> Result<()> {
        let required = ArityRange::of(plan).min;
        match self.max {
            Some(max) if required > max => Err(EngineError::PlanArity { required, max }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ArityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..={}", self.min, max),
            None => write!(f, "{}..", self.min),
        }
    }
}
