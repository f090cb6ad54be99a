//! Compiled rules and the per-step transition algorithm.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use ltl_automaton::{
    Assignment, Automaton, FormulaClass, FormulaCompiler, FormulaError, Guard, LtlfCompiler,
    StateId, Tri, VarId, ALIVE, ALIVE_VAR,
};
use tracing::{debug, error, trace, warn};

use crate::belief::ObservationModel;
use crate::config::RuleConfig;
use crate::error::MonitorError;
use crate::instance::RuleInstance;
use crate::label::{AgentId, Label, LabelMap};
use crate::placeholder::{parse_placeholders, ParsedFormula, Proposition};
use crate::priority::RulePriority;

/// Weight used by [`RuleTemplate::builder`] unless overridden.
pub const DEFAULT_WEIGHT: f64 = -1.0;

/// Initial belief used unless overridden: the rule is assumed to bind.
pub const DEFAULT_INITIAL_BELIEF: f64 = 1.0;

#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Proposition resolved to its automaton variable.
#[derive(Debug, Clone)]
struct Binding {
    proposition: Proposition,
    var: VarId,
}

/// One rule, compiled once and shared by every instance derived from it.
///
/// Weight, final reward and priority can be changed through `&self`. The
/// stores are relaxed, so callers that adjust them while other threads
/// evaluate must order the accesses themselves.
#[derive(Debug)]
pub struct RuleTemplate {
    formula: String,
    parsed: ParsedFormula,
    bindings: Vec<Binding>,
    automaton: Automaton,
    weight: AtomicF64,
    final_reward: AtomicF64,
    final_reward_set: AtomicBool,
    priority: AtomicU32,
    initial_belief: f64,
    observation_model: ObservationModel,
}

impl RuleTemplate {
    /// Compile `formula` with default belief parameters.
    pub fn new(
        formula: &str,
        weight: f64,
        priority: RulePriority,
    ) -> Result<Arc<Self>, MonitorError> {
        Self::builder(formula).weight(weight).priority(priority).build()
    }

    /// Start a builder with the default weight, priority and belief parameters.
    pub fn builder(formula: &str) -> RuleTemplateBuilder {
        RuleTemplateBuilder::new(formula)
    }

    /// Compile the rule described by `config`.
    pub fn from_config(config: &RuleConfig) -> Result<Arc<Self>, MonitorError> {
        let mut builder = Self::builder(&config.formula)
            .weight(config.weight)
            .priority(config.priority)
            .initial_belief(config.initial_belief)
            .observation_model(config.observation_model);
        if let Some(reward) = config.final_reward {
            builder = builder.final_reward(reward);
        }
        builder.build()
    }

    /// Current parameters as a [`RuleConfig`]; `final_reward` only when set explicitly.
    pub fn to_config(&self) -> RuleConfig {
        RuleConfig {
            formula: self.formula.clone(),
            weight: self.weight(),
            priority: self.priority(),
            initial_belief: self.initial_belief,
            final_reward: self
                .final_reward_set
                .load(Ordering::Relaxed)
                .then(|| self.final_reward.load()),
            observation_model: self.observation_model,
        }
    }

    fn compile(
        builder: RuleTemplateBuilder,
        compiler: &dyn FormulaCompiler,
    ) -> Result<Self, MonitorError> {
        if !(0.0..=1.0).contains(&builder.initial_belief) {
            return Err(MonitorError::InvalidBelief(builder.initial_belief));
        }

        let parsed = parse_placeholders(&builder.formula)?;
        let mut automaton = compiler.compile(&parsed.agent_free)?;

        if automaton.formula_class() == FormulaClass::Safety {
            // an empty continuation satisfies a safety rule
            if let Some(accepting) = automaton.first_accepting_state() {
                let initial = automaton.initial_state();
                automaton.add_edge(initial, Guard::literal(ALIVE_VAR, false), accepting)?;
            }
        }

        let bindings = parsed
            .alphabet
            .iter()
            .map(|prop| {
                automaton
                    .variable(&prop.name)
                    .map(|var| Binding {
                        proposition: prop.clone(),
                        var,
                    })
                    .ok_or_else(|| FormulaError::UnknownProposition(prop.name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            formula = %builder.formula,
            cleaned = %parsed.agent_free,
            states = automaton.num_states(),
            class = %automaton.formula_class(),
            agent_specific = parsed.agent_specific,
            "rule compiled"
        );

        Ok(Self {
            formula: builder.formula,
            parsed,
            bindings,
            automaton,
            weight: AtomicF64::new(builder.weight),
            final_reward: AtomicF64::new(builder.final_reward.unwrap_or(builder.weight)),
            final_reward_set: AtomicBool::new(builder.final_reward.is_some()),
            priority: AtomicU32::new(builder.priority.value()),
            initial_belief: builder.initial_belief,
            observation_model: builder.observation_model,
        })
    }

    // ------------------------------------------------------------------
    // Instantiation
    // ------------------------------------------------------------------

    /// Create the instances needed for `new_agent_ids`, skipping id tuples
    /// already covered by `existing_agent_ids`.
    ///
    /// Rules without placeholders always yield exactly one instance.
    pub fn instantiate(
        self: &Arc<Self>,
        new_agent_ids: &[AgentId],
        existing_agent_ids: &[AgentId],
    ) -> Vec<RuleInstance> {
        if !self.is_agent_specific() {
            return vec![RuleInstance::new(Arc::clone(self), Vec::new())];
        }

        let k = self.num_slots();
        let current: BTreeSet<AgentId> = new_agent_ids
            .iter()
            .chain(existing_agent_ids)
            .copied()
            .collect();
        if current.len() < k {
            debug!(formula = %self.formula, ids = current.len(), slots = k, "not enough agents");
            return Vec::new();
        }

        let existing: BTreeSet<AgentId> = existing_agent_ids.iter().copied().collect();
        let existing: BTreeSet<Vec<AgentId>> = k_permutations(&existing, k).into_iter().collect();

        let instances: Vec<RuleInstance> = k_permutations(&current, k)
            .into_iter()
            .filter(|perm| !existing.contains(perm))
            .map(|perm| RuleInstance::new(Arc::clone(self), perm))
            .collect();
        debug!(formula = %self.formula, created = instances.len(), "instantiated rule");
        instances
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Advance `instance` by one step and return the step penalty.
    ///
    /// # Aborts
    ///
    /// Aborts the process when a required label is missing or the automaton
    /// cannot decide a transition. The abort does not unwind, so it cannot
    /// be caught and the episode cannot continue with the rule skipped. Use
    /// [`RuleTemplate::try_evaluate`] to observe the condition as an error
    /// instead.
    pub fn evaluate(&self, labels: &LabelMap, instance: &mut RuleInstance) -> f64 {
        match self.try_evaluate(labels, instance) {
            Ok(penalty) => penalty,
            Err(err) => {
                error!(formula = %self.formula, error = %err, "aborting rule evaluation");
                eprintln!("fatal: {err}");
                std::process::abort();
            }
        }
    }

    /// Advance `instance` by one step, returning the fatal conditions of
    /// [`RuleTemplate::evaluate`] as errors. The instance is unchanged on error.
    pub fn try_evaluate(
        &self,
        labels: &LabelMap,
        instance: &mut RuleInstance,
    ) -> Result<f64, MonitorError> {
        self.transit(labels, true, instance)
    }

    /// Penalty the instance would receive if the episode ended now.
    /// The instance itself is left untouched.
    pub fn final_penalty(&self, instance: &RuleInstance) -> f64 {
        let mut ended = instance.clone();
        if let Err(err) = self.transit(&LabelMap::new(), false, &mut ended) {
            warn!(formula = %self.formula, error = %err, "final transition failed");
        }
        if self.automaton.is_accepting(ended.current_state) {
            0.0
        } else {
            self.final_reward()
        }
    }

    /// Update the instance's belief that this rule binds.
    pub fn update_belief(&self, instance: &mut RuleInstance) {
        if self.automaton.formula_class() != FormulaClass::Safety
            && !self.automaton.is_accepting(instance.current_state)
        {
            instance.violation_count += 1;
        }
        if instance.violation_count == 0 {
            return;
        }
        match self.observation_model.bayes_update(instance.belief) {
            Some(posterior) => {
                trace!(prior = instance.belief, posterior, "belief updated");
                instance.belief = posterior;
            }
            None => warn!(
                formula = %self.formula,
                belief = instance.belief,
                "violation has zero likelihood, belief unchanged"
            ),
        }
    }

    fn transit(
        &self,
        labels: &LabelMap,
        alive: bool,
        instance: &mut RuleInstance,
    ) -> Result<f64, MonitorError> {
        let assignment = self.assignment(labels, alive, instance)?;

        let mut undefined = false;
        let mut next: Option<StateId> = None;
        for edge in self.automaton.out(instance.current_state) {
            match edge.guard.evaluate(&assignment) {
                Tri::True => {
                    next = Some(edge.dst);
                    break;
                }
                Tri::Undef => undefined = true,
                Tri::False => {}
            }
        }

        match next {
            Some(dst) => {
                trace!(from = instance.current_state, to = dst, alive, "transition");
                instance.current_state = dst;
                Ok(0.0)
            }
            None if !undefined => {
                instance.violation_count += 1;
                debug!(
                    formula = %self.formula,
                    state = instance.current_state,
                    violations = instance.violation_count,
                    agent_ids = ?instance.agent_ids,
                    "rule violated"
                );
                instance.current_state = self.automaton.initial_state();
                Ok(self.weight())
            }
            None if alive => Err(MonitorError::Inconsistent {
                formula: self.formula.clone(),
            }),
            None => Ok(0.0),
        }
    }

    fn assignment(
        &self,
        labels: &LabelMap,
        alive: bool,
        instance: &RuleInstance,
    ) -> Result<Assignment, MonitorError> {
        let mut assignment = Assignment::new();
        for binding in &self.bindings {
            let prop = &binding.proposition;
            if prop.name == ALIVE && prop.slot.is_none() {
                assignment.set(binding.var, alive);
                continue;
            }
            let label = match prop.slot {
                Some(slot) => instance
                    .agent_ids
                    .get(slot)
                    .map(|&id| Label::for_agent(prop.name.as_str(), id)),
                None => Some(Label::new(prop.name.as_str())),
            };
            match label.as_ref().and_then(|l| labels.get(l)) {
                Some(&value) => assignment.set(binding.var, value),
                None if alive => {
                    return Err(MonitorError::UndefinedLabel {
                        formula: self.formula.clone(),
                        label: prop.name.clone(),
                    });
                }
                None => {}
            }
        }
        Ok(assignment)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Formula text as given, placeholders included.
    pub fn formula(&self) -> &str {
        &self.formula
    }

    /// Formula text with the `#<n>` suffixes removed, as compiled.
    pub fn agent_free_formula(&self) -> &str {
        &self.parsed.agent_free
    }

    /// Propositions in first-appearance order, `alive` last.
    pub fn alphabet(&self) -> &[Proposition] {
        &self.parsed.alphabet
    }

    /// Whether any proposition carries a role placeholder.
    pub fn is_agent_specific(&self) -> bool {
        self.parsed.agent_specific
    }

    /// Number of agent ids each instance binds.
    pub fn num_slots(&self) -> usize {
        self.parsed.num_slots()
    }

    /// The compiled automaton, including the safety end-of-episode edge.
    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    /// Safety or other, as classified by the compiler.
    pub fn formula_class(&self) -> FormulaClass {
        self.automaton.formula_class()
    }

    /// Penalty returned for each violating step.
    pub fn weight(&self) -> f64 {
        self.weight.load()
    }

    /// Change the step penalty. The final reward follows unless it was set explicitly.
    pub fn set_weight(&self, weight: f64) {
        self.weight.store(weight);
        if !self.final_reward_set.load(Ordering::Relaxed) {
            self.final_reward.store(weight);
        }
    }

    /// Penalty for ending the episode in a rejecting state. Follows the
    /// weight unless set explicitly.
    pub fn final_reward(&self) -> f64 {
        self.final_reward.load()
    }

    /// Fix the final reward independently of the weight.
    pub fn set_final_reward(&self, reward: f64) {
        self.final_reward.store(reward);
        self.final_reward_set.store(true, Ordering::Relaxed);
    }

    /// Caller-assigned priority.
    pub fn priority(&self) -> RulePriority {
        RulePriority(self.priority.load(Ordering::Relaxed))
    }

    /// Change the priority seen by every instance of this rule.
    pub fn set_priority(&self, priority: RulePriority) {
        self.priority.store(priority.value(), Ordering::Relaxed);
    }

    /// Belief each new instance starts with.
    pub fn initial_belief(&self) -> f64 {
        self.initial_belief
    }

    /// Likelihoods used by [`RuleTemplate::update_belief`].
    pub fn observation_model(&self) -> &ObservationModel {
        &self.observation_model
    }

    /// Graphviz rendering of the compiled automaton.
    pub fn to_dot(&self) -> String {
        self.automaton.to_dot()
    }

    /// Write [`RuleTemplate::to_dot`] to `path`.
    pub fn write_dot(&self, path: impl AsRef<Path>) -> Result<(), MonitorError> {
        std::fs::write(path, self.to_dot())?;
        Ok(())
    }
}

impl fmt::Display for RuleTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\", weight: {}, priority: {}",
            self.formula,
            self.weight(),
            self.priority()
        )
    }
}

/// Ordered `k`-permutations of `values`, lexicographic in ascending ids.
fn k_permutations(values: &BTreeSet<AgentId>, k: usize) -> Vec<Vec<AgentId>> {
    fn extend(
        values: &[AgentId],
        k: usize,
        used: &mut Vec<bool>,
        current: &mut Vec<AgentId>,
        out: &mut Vec<Vec<AgentId>>,
    ) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        for i in 0..values.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            current.push(values[i]);
            extend(values, k, used, current, out);
            current.pop();
            used[i] = false;
        }
    }

    if values.len() < k || values.is_empty() {
        return Vec::new();
    }
    let values: Vec<AgentId> = values.iter().copied().collect();
    let mut out = Vec::new();
    extend(
        &values,
        k,
        &mut vec![false; values.len()],
        &mut Vec::with_capacity(k),
        &mut out,
    );
    out
}

/// Builder for [`RuleTemplate`] exposing every construction parameter.
pub struct RuleTemplateBuilder {
    formula: String,
    weight: f64,
    priority: RulePriority,
    initial_belief: f64,
    final_reward: Option<f64>,
    observation_model: ObservationModel,
    compiler: Option<Box<dyn FormulaCompiler>>,
}

impl RuleTemplateBuilder {
    fn new(formula: &str) -> Self {
        Self {
            formula: formula.to_string(),
            weight: DEFAULT_WEIGHT,
            priority: RulePriority::default(),
            initial_belief: DEFAULT_INITIAL_BELIEF,
            final_reward: None,
            observation_model: ObservationModel::default(),
            compiler: None,
        }
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn priority(mut self, priority: RulePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn initial_belief(mut self, belief: f64) -> Self {
        self.initial_belief = belief;
        self
    }

    pub fn final_reward(mut self, reward: f64) -> Self {
        self.final_reward = Some(reward);
        self
    }

    pub fn observation_model(mut self, model: ObservationModel) -> Self {
        self.observation_model = model;
        self
    }

    /// Compile with `compiler` instead of the built-in LTLf compiler.
    pub fn compiler(mut self, compiler: impl FormulaCompiler + 'static) -> Self {
        self.compiler = Some(Box::new(compiler));
        self
    }

    /// Parse placeholders, compile and validate the parameters.
    pub fn build(mut self) -> Result<Arc<RuleTemplate>, MonitorError> {
        let compiler: Box<dyn FormulaCompiler> = match self.compiler.take() {
            Some(compiler) => compiler,
            None => Box::new(LtlfCompiler::with_defaults()),
        };
        RuleTemplate::compile(self, compiler.as_ref()).map(Arc::new)
    }
}

impl fmt::Debug for RuleTemplateBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleTemplateBuilder")
            .field("formula", &self.formula)
            .field("weight", &self.weight)
            .field("priority", &self.priority)
            .field("initial_belief", &self.initial_belief)
            .field("final_reward", &self.final_reward)
            .field("custom_compiler", &self.compiler.is_some())
            .finish()
    }
}
