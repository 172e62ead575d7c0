//! Overload resolution for cross-runtime calls.
//!
//! This module selects the constructor or method to invoke for an untyped
//! script argument list and converts the arguments to match it.
//!
//! ## Algorithm
//!
//! 1. Score every candidate: a by-reference parameter or an argument count
//!    outside `[min_args, max_args]` makes it `Incompatible`; otherwise the
//!    score is the minimum over its parameters
//! 2. Fail if no candidate reaches `ImplicitConversion`
//! 3. Keep the candidates with the maximal score and pick the most specific
//!    one (ties go to the first in input order)
//! 4. Convert the arguments for the winner only
//!
//! ## Variable Arity
//!
//! A `params` slot binds either the single trailing argument as the array
//! itself (when it converts at least as well to the array type as to the
//! element type) or collects all trailing arguments, possibly none, into a
//! fresh array of the element type.

mod ranking;

pub use ranking::{Preference, compare_candidates, compare_types, find_most_specific};

use crossbind_core::{BindError, CallableCandidate, DynValue, Param, TypeHash, Value, primitives};
use tracing::{debug, trace};

use crate::config::AmbiguityPolicy;
use crate::conversion::{ConversionScope, MatchScore, TypeCoercion};

/// Converted arguments for the selected candidate, one per formal parameter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundArguments {
    values: Vec<Value>,
}

impl BoundArguments {
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

/// Result of successful overload resolution.
#[derive(Debug, Clone)]
pub struct Resolution<'c> {
    /// Position of the winner in the candidate list.
    pub index: usize,
    pub candidate: &'c CallableCandidate,
    /// Overall score of the winner.
    pub score: MatchScore,
    pub arguments: BoundArguments,
}

/// Selects among statically typed candidates for untyped arguments.
#[derive(Clone, Copy)]
pub struct OverloadResolver<'r> {
    coercion: TypeCoercion<'r>,
    ambiguity: AmbiguityPolicy,
}

impl<'r> OverloadResolver<'r> {
    pub fn new(coercion: TypeCoercion<'r>, ambiguity: AmbiguityPolicy) -> Self {
        Self {
            coercion,
            ambiguity,
        }
    }

    pub fn coercion(&self) -> TypeCoercion<'r> {
        self.coercion
    }

    /// Resolve a call to `name` among `candidates` with `args`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve<'c>(
        &self,
        name: &str,
        candidates: &[&'c CallableCandidate],
        args: &[DynValue],
        scope: &mut ConversionScope<'_>,
    ) -> Result<Resolution<'c>, BindError> {
        if candidates.is_empty() {
            debug!(member = name, "no candidates");
            return Err(self.no_applicable(name, args));
        }

        let scores: Vec<MatchScore> = candidates
            .iter()
            .map(|candidate| self.score_candidate(candidate, args))
            .collect();
        let best_score = scores
            .iter()
            .copied()
            .max()
            .unwrap_or(MatchScore::Incompatible);
        if !best_score.is_applicable() {
            debug!(
                member = name,
                candidates = candidates.len(),
                "no applicable candidate"
            );
            return Err(self.no_applicable(name, args));
        }

        let (indices, maximal): (Vec<usize>, Vec<&CallableCandidate>) = candidates
            .iter()
            .zip(&scores)
            .enumerate()
            .filter(|(_, (_, score))| **score == best_score)
            .map(|(index, (candidate, _))| (index, *candidate))
            .unzip();

        let registry = self.coercion.registry();
        let Some((best, undominated)) = find_most_specific(registry, &maximal) else {
            return Err(self.no_applicable(name, args));
        };
        if self.ambiguity == AmbiguityPolicy::Reject && !undominated.is_empty() {
            let tied: Vec<String> = std::iter::once(best)
                .chain(undominated)
                .map(|i| self.signature(maximal[i]))
                .collect();
            debug!(member = name, tied = tied.len(), "ambiguous call rejected");
            return Err(BindError::AmbiguousMatch {
                name: name.to_string(),
                candidates: tied.join("; "),
            });
        }

        let candidate = maximal[best];
        let arguments = self.bind(candidate, args, scope)?;
        debug!(
            member = name,
            selected = %self.signature(candidate),
            score = ?best_score,
            "resolved overload"
        );
        Ok(Resolution {
            index: indices[best],
            candidate,
            score: best_score,
            arguments,
        })
    }

    // ==========================================================================
    // Scoring
    // ==========================================================================

    /// Overall score of one candidate: the minimum of its parameter scores.
    pub fn score_candidate(&self, candidate: &CallableCandidate, args: &[DynValue]) -> MatchScore {
        if candidate.has_by_ref_param() || !candidate.accepts_arg_count(args.len()) {
            return MatchScore::Incompatible;
        }

        let params_slot = candidate.params_slot();
        let mut score = MatchScore::Exact;
        for (index, param) in candidate.params.iter().enumerate() {
            if params_slot == Some(index) {
                let rest = args.get(index..).unwrap_or_default();
                score = score.min(self.score_params_slot(param, rest));
                break;
            }
            // Omitted optional parameters take their default and do not
            // affect the score.
            if let Some(arg) = args.get(index) {
                score = score.min(self.coercion.classify(arg, param.data_type));
            }
            if score == MatchScore::Incompatible {
                break;
            }
        }
        trace!(candidate = %candidate.name, ?score, "scored candidate");
        score
    }

    fn score_params_slot(&self, param: &Param, rest: &[DynValue]) -> MatchScore {
        let element = self.element_type(param.data_type);
        match rest {
            [] => MatchScore::Exact,
            [single] => self
                .coercion
                .classify(single, param.data_type)
                .max(self.coercion.classify(single, element)),
            many => many
                .iter()
                .map(|arg| self.coercion.classify(arg, element))
                .min()
                .unwrap_or(MatchScore::Exact),
        }
    }

    fn element_type(&self, array_type: TypeHash) -> TypeHash {
        self.coercion
            .registry()
            .get(array_type)
            .map(|entry| entry.element_type())
            .unwrap_or(primitives::OBJECT)
    }

    // ==========================================================================
    // Binding
    // ==========================================================================

    fn bind(
        &self,
        candidate: &CallableCandidate,
        args: &[DynValue],
        scope: &mut ConversionScope<'_>,
    ) -> Result<BoundArguments, BindError> {
        let params_slot = candidate.params_slot();
        let mut values = Vec::with_capacity(candidate.params.len());
        for (index, param) in candidate.params.iter().enumerate() {
            if params_slot == Some(index) {
                let rest = args.get(index..).unwrap_or_default();
                values.push(self.bind_params_slot(param, rest, index, scope)?);
                break;
            }
            match args.get(index) {
                Some(arg) => values.push(self.convert(arg, param.data_type, index, scope)?),
                None => values.push(param.default.clone().unwrap_or(Value::Null)),
            }
        }
        Ok(BoundArguments { values })
    }

    fn bind_params_slot(
        &self,
        param: &Param,
        rest: &[DynValue],
        index: usize,
        scope: &mut ConversionScope<'_>,
    ) -> Result<Value, BindError> {
        let element = self.element_type(param.data_type);
        if let [single] = rest {
            let direct = self.coercion.classify(single, param.data_type);
            let each = self.coercion.classify(single, element);
            if direct >= each {
                return self.convert(single, param.data_type, index, scope);
            }
        }
        let items = rest
            .iter()
            .enumerate()
            .map(|(offset, arg)| self.convert(arg, element, index + offset, scope))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::array(param.data_type, element, items))
    }

    fn convert(
        &self,
        arg: &DynValue,
        target: TypeHash,
        index: usize,
        scope: &mut ConversionScope<'_>,
    ) -> Result<Value, BindError> {
        self.coercion
            .convert(arg, target, scope)
            .map(|(value, _)| value)
            .map_err(|_| BindError::IncompatibleArgument {
                index,
                target: self.coercion.registry().name_of(target),
            })
    }

    // ==========================================================================
    // Diagnostics
    // ==========================================================================

    fn signature(&self, candidate: &CallableCandidate) -> String {
        let registry = self.coercion.registry();
        let params: Vec<String> = candidate
            .params
            .iter()
            .map(|p| registry.name_of(p.data_type))
            .collect();
        format!("{}({})", candidate.name, params.join(", "))
    }

    fn no_applicable(&self, name: &str, args: &[DynValue]) -> BindError {
        let args: Vec<&str> = args.iter().map(DynValue::kind_name).collect();
        BindError::NoApplicableMember {
            name: name.to_string(),
            args: args.join(", "),
        }
    }
}
