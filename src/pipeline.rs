//! Chainable pipelines over a single current value.
//!
//! A [`Pipeline`] holds one [`Value`] and replaces it with the result of
//! every operation called on it. Operations are the methods of the
//! [`Chain`] trait; each consumes the pipeline handle and returns it, so
//! calls read left to right:
//!
//! ```
//! use u_numchain::{wrap, Chain, Value};
//! let v = wrap(vec![5.0, 7.0, 1.0, 4.0]).subtract(1).multiply(2).value();
//! assert_eq!(v, Value::from(vec![8.0, 12.0, 0.0, 6.0]));
//! ```
//!
//! # Evaluation modes
//!
//! - **Immediate** (initial): every operation runs at once.
//! - **Deferred** (after [`Pipeline::aggregate`]): element-wise arithmetic
//!   is queued instead. [`Pipeline::dispatch`] flattens the current value
//!   and runs each leaf through the whole queue in one traversal, so no
//!   intermediate collection is built per operation. Reductions, rounding
//!   and the statistical reducers are not element-wise: they replay the
//!   queue first and then run immediately.
//!
//! [`Pipeline::value`] dispatches implicitly.
//!
//! # Sharing
//!
//! A pipeline is a handle. [`Pipeline::share`], `wrap(&pipeline)` and
//! `wrap(pipeline)` give handles to the same state, and every one of them
//! observes the mutations made through the others. [`Pipeline::copy`]
//! starts an independent pipeline from a deep copy of the current value.
//! Handles are single-threaded (`!Send`).

use std::cell::RefCell;
use std::rc::Rc;

use crate::broadcast::{self, Operator};
use crate::config::{Config, Mode};
use crate::error::BroadcastError;
use crate::flatten::{flatten, linearize, size};
use crate::round;
use crate::stats::{self, VarianceKind};
use crate::value::Value;

/// An operation waiting in a deferred pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOp {
    pub operator: Operator,
    pub argument: Operand,
}

/// Right-hand side of a [`PendingOp`].
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Broadcast against the current value by the usual shape rules.
    Value(Value),
    /// Fixed exponent or degree, applied to every leaf.
    Parameter(f64),
}

/// Evaluation mode of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    Immediate,
    Deferred,
}

#[derive(Debug)]
struct Inner {
    value: Value,
    state: State,
    pending: Vec<PendingOp>,
    config: Config,
    error: Option<BroadcastError>,
}

/// Right-hand argument of a queued operation, resolved per leaf.
enum Argument<'a> {
    Each(Vec<Value>),
    Same(&'a Value),
    Fixed(f64),
}

impl Argument<'_> {
    fn at(&self, i: usize) -> Option<f64> {
        match self {
            Argument::Each(leaves) => leaves.get(i).and_then(Value::as_finite),
            Argument::Same(v) => v.as_finite(),
            Argument::Fixed(p) => Some(*p),
        }
    }
}

impl Inner {
    fn new(value: Value, config: Config) -> Self {
        Self {
            value,
            state: State::Immediate,
            pending: Vec::new(),
            config,
            error: None,
        }
    }

    fn push(&mut self, operator: Operator, argument: Option<Value>) {
        if self.error.is_some() {
            return;
        }
        match (self.state, argument) {
            (State::Deferred, Some(argument)) => self.pending.push(PendingOp {
                operator,
                argument: Operand::Value(argument),
            }),
            (_, argument) => {
                self.flush();
                self.evaluate(operator, argument.as_ref());
            }
        }
    }

    fn push_parameter(&mut self, operator: Operator, parameter: f64) {
        if self.error.is_some() {
            return;
        }
        match self.state {
            State::Deferred => self.pending.push(PendingOp {
                operator,
                argument: Operand::Parameter(parameter),
            }),
            State::Immediate => {
                self.flush();
                self.evaluate_parameter(operator, parameter);
            }
        }
    }

    fn transform<F: FnOnce(&Value) -> Value>(&mut self, f: F) {
        self.flush();
        if self.error.is_none() {
            self.value = f(&self.value);
        }
    }

    fn evaluate(&mut self, operator: Operator, argument: Option<&Value>) {
        match self.config.mode {
            Mode::Permissive => self.value = broadcast::apply(&self.value, argument, operator),
            Mode::Strict => match broadcast::try_apply(&self.value, argument, operator) {
                Ok(v) => self.value = v,
                Err(err) => self.latch(err),
            },
        }
    }

    fn evaluate_parameter(&mut self, operator: Operator, parameter: f64) {
        match self.config.mode {
            Mode::Permissive => {
                self.value = broadcast::apply_parameter(&self.value, operator, parameter);
            }
            Mode::Strict => match broadcast::try_apply_parameter(&self.value, operator, parameter) {
                Ok(v) => self.value = v,
                Err(err) => self.latch(err),
            },
        }
    }

    fn latch(&mut self, err: BroadcastError) {
        tracing::debug!(error = %err, "pipeline stopped on broadcast error");
        self.error = Some(err);
    }

    /// Replays the queue, leaving the mode unchanged.
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let ops = std::mem::take(&mut self.pending);

        // A scalar keeps its scalar rules, and strict mode needs every
        // operation checked on its own.
        if !self.value.is_collection() || self.config.mode == Mode::Strict {
            for op in &ops {
                if self.error.is_some() {
                    break;
                }
                match &op.argument {
                    Operand::Value(argument) => self.evaluate(op.operator, Some(argument)),
                    Operand::Parameter(p) => self.evaluate_parameter(op.operator, *p),
                }
            }
            return;
        }

        let args: Vec<Argument<'_>> = ops
            .iter()
            .map(|op| match &op.argument {
                Operand::Value(v) if v.is_collection() => Argument::Each(flatten(v)),
                Operand::Value(v) => Argument::Same(v),
                Operand::Parameter(p) => Argument::Fixed(*p),
            })
            .collect();

        let mut leaves = flatten(&self.value);
        tracing::debug!(
            leaves = leaves.len(),
            ops = ops.len(),
            "dispatching deferred operations"
        );
        for (i, leaf) in leaves.iter_mut().enumerate() {
            for (op, arg) in ops.iter().zip(&args) {
                if let (Some(x), Some(y)) = (leaf.as_finite(), arg.at(i)) {
                    *leaf = Value::Number(op.operator.combine(x, y));
                }
            }
        }
        self.value = Value::Sequence(leaves);
    }

    fn dispatch(&mut self) {
        self.flush();
        self.state = State::Immediate;
    }
}

/// A chainable computation over one current value.
///
/// See the module documentation for evaluation modes and sharing.
#[derive(Debug)]
pub struct Pipeline {
    inner: Rc<RefCell<Inner>>,
}

impl Pipeline {
    /// Starts a pipeline over `value` with the default configuration.
    pub fn new(value: impl Into<Value>) -> Self {
        Self::with_config(value, Config::default())
    }

    /// Starts a pipeline over `value` with `config`.
    ///
    /// # Examples
    /// ```
    /// use u_numchain::{config::{Config, Mode}, Chain, Pipeline};
    /// let p = Pipeline::with_config(vec![1.0, 2.0], Config::default().mode(Mode::Strict));
    /// assert!(p.sum(vec![1.0]).try_value().is_err());
    /// ```
    pub fn with_config(value: impl Into<Value>, config: Config) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner::new(value.into(), config))),
        }
    }

    /// The configuration this pipeline was built with.
    pub fn config(&self) -> Config {
        self.inner.borrow().config
    }

    /// Current evaluation mode.
    pub fn state(&self) -> State {
        self.inner.borrow().state
    }

    /// Operations waiting for [`dispatch`](Self::dispatch).
    pub fn pending(&self) -> Vec<PendingOp> {
        self.inner.borrow().pending.clone()
    }

    /// Another handle to the same pipeline state.
    pub fn share(&self) -> Pipeline {
        Pipeline {
            inner: Rc::clone(&self.inner),
        }
    }

    /// An independent pipeline over a deep copy of the current value.
    ///
    /// The copy starts in immediate mode with an empty queue: operations
    /// still queued here are not carried over.
    ///
    /// # Examples
    /// ```
    /// use u_numchain::{wrap, Chain, Value};
    /// let price = wrap(vec![10.0, 30.0, 80.0]);
    /// let doubled = price.copy().multiply(2);
    /// assert_eq!(price.value(), Value::from(vec![10.0, 30.0, 80.0]));
    /// assert_eq!(doubled.value(), Value::from(vec![20.0, 60.0, 160.0]));
    /// ```
    pub fn copy(&self) -> Pipeline {
        let inner = self.inner.borrow();
        Pipeline::with_config(inner.value.clone(), inner.config)
    }

    /// Alias of [`copy`](Self::copy). `Pipeline` does not implement
    /// [`Clone`]; use [`share`](Self::share) for another handle.
    #[allow(clippy::should_implement_trait)]
    pub fn clone(&self) -> Pipeline {
        self.copy()
    }

    /// Switches to deferred mode.
    pub fn aggregate(self) -> Self {
        self.inner.borrow_mut().state = State::Deferred;
        self
    }

    /// Replays every queued operation and returns to immediate mode.
    pub fn dispatch(self) -> Self {
        self.inner.borrow_mut().dispatch();
        self
    }

    /// Replays every queued operation; stays deferred if `keep_deferred`.
    ///
    /// # Examples
    /// ```
    /// use u_numchain::{wrap, Chain, Value};
    /// let v = wrap(3)
    ///     .aggregate()
    ///     .sum(4).multiply(2).sum(2)
    ///     .load(true)
    ///     .sum(4).multiply(0.5)
    ///     .value();
    /// assert_eq!(v, Value::from(10));
    /// ```
    pub fn load(self, keep_deferred: bool) -> Self {
        {
            let mut inner = self.inner.borrow_mut();
            inner.flush();
            if !keep_deferred {
                inner.state = State::Immediate;
            }
        }
        self
    }

    /// The current value, dispatching queued operations first.
    ///
    /// In strict mode this is the last value computed before an error.
    pub fn value(&self) -> Value {
        let mut inner = self.inner.borrow_mut();
        inner.dispatch();
        inner.value.clone()
    }

    /// The current value, or the error that stopped a strict pipeline.
    ///
    /// # Errors
    /// The first [`BroadcastError`] met in [`Mode::Strict`].
    pub fn try_value(&self) -> Result<Value, BroadcastError> {
        let mut inner = self.inner.borrow_mut();
        inner.dispatch();
        match &inner.error {
            Some(err) => Err(err.clone()),
            None => Ok(inner.value.clone()),
        }
    }
}

/// Chainable operations.
///
/// Implementors supply [`binary`](Chain::binary),
/// [`parameterized`](Chain::parameterized) and
/// [`transform`](Chain::transform); every named operation is defined in
/// terms of those three.
pub trait Chain: Sized {
    /// Broadcasts `operator` between the current value and `argument`,
    /// or queues it in deferred mode. `None` means "no argument" and is
    /// never queued.
    fn binary(self, operator: Operator, argument: Option<Value>) -> Self;

    /// Applies `operator` with the fixed right operand `parameter` to every
    /// leaf, or queues it in deferred mode. The parameter never selects a
    /// shape rule, so a zero exponent still maps leaf by leaf.
    fn parameterized(self, operator: Operator, parameter: f64) -> Self;

    /// Replaces the current value with `f(current)` after replaying any
    /// queued operations.
    fn transform<F>(self, f: F) -> Self
    where
        F: FnOnce(&Value) -> Value;

    /// Precision used by [`round_default`](Chain::round_default).
    fn default_precision(&self) -> u32;

    // --- arithmetic ---

    /// Adds `b` by the broadcasting rules. A falsy `b` (zero, empty)
    /// sums the leaves instead, like [`sum_all`](Chain::sum_all).
    fn sum(self, b: impl Into<Value>) -> Self {
        self.binary(Operator::Add, Some(b.into()))
    }

    /// Sum of all leaves of the current value.
    fn sum_all(self) -> Self {
        self.binary(Operator::Add, None)
    }

    /// Subtracts `b` (`current - b`).
    fn subtract(self, b: impl Into<Value>) -> Self {
        self.binary(Operator::Subtract, Some(b.into()))
    }

    /// Multiplies by `b`. A falsy `b` takes the product of the leaves.
    fn multiply(self, b: impl Into<Value>) -> Self {
        self.binary(Operator::Multiply, Some(b.into()))
    }

    /// Product of all leaves of the current value.
    fn product(self) -> Self {
        self.binary(Operator::Multiply, None)
    }

    /// Divides by `b` (`current / b`).
    fn divide(self, b: impl Into<Value>) -> Self {
        self.binary(Operator::Divide, Some(b.into()))
    }

    /// Natural logarithm of every leaf.
    fn ln(self) -> Self {
        self.parameterized(Operator::Ln, 1.0)
    }

    /// Logarithm to `base`, which broadcasts like any other right operand.
    fn log(self, base: impl Into<Value>) -> Self {
        self.binary(Operator::Log, Some(base.into()))
    }

    /// Raises every leaf to `degree`.
    ///
    /// # Examples
    /// ```
    /// use u_numchain::{wrap, Chain, Value};
    /// let v = wrap(vec![2.0, 3.0, 4.0]).pow(0.0).value();
    /// assert_eq!(v, Value::from(vec![1.0, 1.0, 1.0]));
    /// ```
    fn pow(self, degree: f64) -> Self {
        self.parameterized(Operator::Pow, degree)
    }

    fn power(self, degree: f64) -> Self {
        self.pow(degree)
    }

    /// The `degree`-th root of every leaf.
    fn root(self, degree: f64) -> Self {
        self.parameterized(Operator::Root, degree)
    }

    fn rt(self, degree: f64) -> Self {
        self.root(degree)
    }

    /// Square root of every leaf.
    fn sqrt(self) -> Self {
        self.parameterized(Operator::Sqrt, 1.0)
    }

    fn square_root(self) -> Self {
        self.sqrt()
    }

    // --- structure ---

    /// Flattens the current value followed by `extra` into one sequence.
    fn linearize<I, V>(self, extra: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut items = vec![Value::Null];
        items.extend(extra.into_iter().map(Into::into));
        self.transform(move |current| {
            items[0] = current.clone();
            Value::Sequence(linearize(&items))
        })
    }

    /// Number of leaves in the current value.
    fn size(self) -> Self {
        self.transform(|current| Value::from(size(current)))
    }

    fn round(self, precision: u32) -> Self {
        self.transform(|current| round::round(current, precision))
    }

    fn round_default(self) -> Self {
        let precision = self.default_precision();
        self.round(precision)
    }

    // --- statistics ---

    fn mean(self) -> Self {
        self.transform(|x| Value::Number(stats::mean(x, None)))
    }

    fn weighted_mean(self, weight: impl Into<Value>) -> Self {
        let w = weight.into();
        self.transform(move |x| Value::Number(stats::mean(x, Some(&w))))
    }

    fn geometric_mean(self) -> Self {
        self.transform(|x| Value::Number(stats::geometric_mean(x, None)))
    }

    fn weighted_geometric_mean(self, weight: impl Into<Value>) -> Self {
        let w = weight.into();
        self.transform(move |x| Value::Number(stats::geometric_mean(x, Some(&w))))
    }

    fn harmonic_mean(self) -> Self {
        self.transform(|x| Value::Number(stats::harmonic_mean(x, None)))
    }

    fn weighted_harmonic_mean(self, weight: impl Into<Value>) -> Self {
        let w = weight.into();
        self.transform(move |x| Value::Number(stats::harmonic_mean(x, Some(&w))))
    }

    fn variance(self, kind: VarianceKind) -> Self {
        self.transform(|x| Value::Number(stats::variance(x, None, kind)))
    }

    fn weighted_variance(self, weight: impl Into<Value>, kind: VarianceKind) -> Self {
        let w = weight.into();
        self.transform(move |x| Value::Number(stats::variance(x, Some(&w), kind)))
    }

    fn standard_deviation(self, kind: VarianceKind) -> Self {
        self.transform(|x| Value::Number(stats::standard_deviation(x, None, kind)))
    }

    fn covariance(self, y: impl Into<Value>, kind: VarianceKind) -> Self {
        let y = y.into();
        self.transform(move |x| Value::Number(stats::covariance(x, &y, None, kind)))
    }

    fn weighted_covariance(
        self,
        y: impl Into<Value>,
        weight: impl Into<Value>,
        kind: VarianceKind,
    ) -> Self {
        let (y, w) = (y.into(), weight.into());
        self.transform(move |x| Value::Number(stats::covariance(x, &y, Some(&w), kind)))
    }

    fn correlation(self, y: impl Into<Value>) -> Self {
        let y = y.into();
        self.transform(move |x| Value::Number(stats::correlation(x, &y, None)))
    }

    fn weighted_correlation(self, y: impl Into<Value>, weight: impl Into<Value>) -> Self {
        let (y, w) = (y.into(), weight.into());
        self.transform(move |x| Value::Number(stats::correlation(x, &y, Some(&w))))
    }
}

impl Chain for Pipeline {
    fn binary(self, operator: Operator, argument: Option<Value>) -> Self {
        self.inner.borrow_mut().push(operator, argument);
        self
    }

    fn parameterized(self, operator: Operator, parameter: f64) -> Self {
        self.inner.borrow_mut().push_parameter(operator, parameter);
        self
    }

    fn transform<F>(self, f: F) -> Self
    where
        F: FnOnce(&Value) -> Value,
    {
        self.inner.borrow_mut().transform(f);
        self
    }

    fn default_precision(&self) -> u32 {
        self.inner.borrow().config.precision
    }
}

// ---------------------------------------------------------------------------
// wrap
// ---------------------------------------------------------------------------

/// Types a pipeline can be started from.
///
/// Raw values produce a new pipeline owning a copy of the data; existing
/// pipelines produce a handle to the same state.
pub trait IntoPipeline {
    fn into_pipeline(self) -> Pipeline;
}

impl IntoPipeline for Pipeline {
    fn into_pipeline(self) -> Pipeline {
        self
    }
}

impl IntoPipeline for &Pipeline {
    fn into_pipeline(self) -> Pipeline {
        self.share()
    }
}

impl IntoPipeline for &Value {
    fn into_pipeline(self) -> Pipeline {
        Pipeline::new(self.clone())
    }
}

macro_rules! impl_into_pipeline {
    ($($t:ty),*) => {
        $(
            impl IntoPipeline for $t {
                fn into_pipeline(self) -> Pipeline {
                    Pipeline::new(self)
                }
            }
        )*
    };
}

impl_into_pipeline!(
    Value,
    f64,
    i32,
    i64,
    usize,
    Vec<f64>,
    Vec<i32>,
    Vec<Vec<f64>>,
    Vec<Value>,
    &[f64],
    serde_json::Value
);

impl<const N: usize> IntoPipeline for [f64; N] {
    fn into_pipeline(self) -> Pipeline {
        Pipeline::new(self)
    }
}

/// Starts a pipeline; wrapping a pipeline returns a handle to it.
///
/// # Examples
/// ```
/// use u_numchain::{wrap, Chain, Value};
/// let data = wrap(vec![5.0, 7.0, 1.0, 4.0]);
/// assert_eq!(wrap(&data).sum_all().value(), Value::from(17));
/// // same state, so the first handle sees the sum too
/// assert_eq!(data.value(), Value::from(17));
/// ```
pub fn wrap(value: impl IntoPipeline) -> Pipeline {
    value.into_pipeline()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Step {
        Scalar(Operator, f64),
        Each(Operator, Vec<f64>),
        Power(f64),
    }

    fn operator() -> impl Strategy<Value = Operator> {
        prop_oneof![
            Just(Operator::Add),
            Just(Operator::Subtract),
            Just(Operator::Multiply),
            Just(Operator::Divide),
        ]
    }

    // Non-zero arguments: zero means "no argument" to the immediate path.
    fn argument() -> impl Strategy<Value = f64> {
        prop_oneof![-100.0_f64..-0.5, 0.5_f64..100.0]
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (operator(), argument()).prop_map(|(op, a)| Step::Scalar(op, a)),
            (operator(), proptest::collection::vec(argument(), 1..12))
                .prop_map(|(op, a)| Step::Each(op, a)),
            prop_oneof![Just(0.0), Just(1.0), Just(2.0)].prop_map(Step::Power),
        ]
    }

    fn run(p: Pipeline, steps: &[Step]) -> Pipeline {
        steps.iter().fold(p, |p, s| match s {
            Step::Scalar(op, a) => p.binary(*op, Some(Value::from(*a))),
            Step::Each(op, a) => p.binary(*op, Some(Value::from(a.clone()))),
            Step::Power(d) => p.pow(*d),
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        // --- Batched and step-by-step evaluation agree ---
        #[test]
        fn deferred_equals_immediate(
            x in proptest::collection::vec(-1e3_f64..1e3, 1..12),
            steps in proptest::collection::vec(step(), 0..6),
        ) {
            let batched = run(wrap(x.clone()).aggregate(), &steps).dispatch().value();
            let immediate = run(wrap(x), &steps).value();
            prop_assert_eq!(batched, immediate);
        }

        // --- A copy never changes the original ---
        #[test]
        fn copy_isolation(
            x in proptest::collection::vec(-1e3_f64..1e3, 0..12),
            steps in proptest::collection::vec(step(), 1..6),
        ) {
            let original = wrap(x.clone());
            let _ = run(original.copy(), &steps).value();
            prop_assert_eq!(original.value(), Value::from(x));
        }
    }
}
