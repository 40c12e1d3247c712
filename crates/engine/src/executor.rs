//! The dispatcher: walks selected nodes, asks the rule manager for the rule
//! of each one, and runs the chosen template.
//!
//! # Execution model
//!
//! - **Frames**: every template invocation gets one local frame from the
//!   [`Bindery`]; the compiler has already assigned each variable a slot.
//! - **Tail calls**: a self-call the compiler marked as a tail call comes
//!   back to the invoking loop as [`Flow::TailCall`] instead of nesting, and
//!   the loop reruns the template in the same frame.
//! - **Current rule**: remembered while a template rule runs so that
//!   apply-imports knows which precedence range to search. For-each clears
//!   it.
//! - **Depth**: non-tail template nesting is limited by `max_depth`;
//!   exceeding it is an error rather than a host stack overflow. Descent by
//!   the built-in rule is iterative and does not count.
use crate::bindery::{Bindery, GlobalState, ParameterSet};
use crate::config::ExecutionConfig;
use crate::error::ExecutionError;
use crate::expression::{Focus, Value, VariableRef, Variables, format_number};
use crate::instruction::NumberLevel;
use crate::output::{Outputter, TextCollector};
use crate::stylesheet::{CompiledParam, CompiledTemplate, Op, Stylesheet, ValueSource};
use itertools::Itertools;
use log::{debug, info, trace};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use stylus_rules::{ModeName, Pattern};
use stylus_tree::{Document, NodeKind, NodeRef, describe};
use stylus_tree::number::{NodePredicate, count_any, count_multiple, count_single};

/// Stops a run from another thread. The run notices at its next template
/// invocation and fails with [`ExecutionError::Terminated`].
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        CancelHandle::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// How a block of instructions finished.
enum Flow<'d> {
    Continue,
    /// The block ended with a tail call; the caller reruns `target`.
    TailCall {
        target: usize,
        params: ParameterSet<'d>,
        focus: Focus<'d>,
    },
}

pub struct Executor<'s, 'd> {
    stylesheet: &'s Stylesheet,
    document: &'d Document,
    config: ExecutionConfig,
    bindery: Bindery<'d>,
    /// Values for global parameters supplied by the host.
    supplied: HashMap<String, Value<'d>>,
    /// The template rule being run and the mode it was found in.
    current: Option<(usize, ModeName)>,
    depth: usize,
    cancel: CancelHandle,
    messages: Vec<String>,
}

impl<'s, 'd> Executor<'s, 'd> {
    /// Prepares a run of `stylesheet` over `document`, which must have been
    /// built in the stylesheet's name pool.
    pub fn new(
        stylesheet: &'s Stylesheet,
        document: &'d Document,
        config: ExecutionConfig,
    ) -> Result<Self, ExecutionError> {
        if document.pool().id() != stylesheet.pool().id() {
            return Err(ExecutionError::ForeignDocument);
        }
        Ok(Executor {
            stylesheet,
            document,
            bindery: Bindery::new(stylesheet.globals.len(), stylesheet.max_frame_size()),
            config,
            supplied: HashMap::new(),
            current: None,
            depth: 0,
            cancel: CancelHandle::new(),
            messages: Vec::new(),
        })
    }

    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Supplies the value of a global parameter.
    pub fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), ExecutionError> {
        let declared = self
            .stylesheet
            .global_names
            .get(name)
            .is_some_and(|&index| self.stylesheet.globals[index].is_param);
        if !declared {
            return Err(ExecutionError::UnknownParameter(name.to_string()));
        }
        self.supplied
            .insert(name.to_string(), Value::Text(value.to_string()));
        Ok(())
    }

    /// Text of every message instruction run so far.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Processes the document root in the default mode.
    pub fn run(&mut self, out: &mut dyn Outputter) -> Result<(), ExecutionError> {
        debug!("Transforming document {}", self.document.id());
        let focus = Focus::new(self.document.root());
        self.apply_to_node(&focus, &ModeName::Default, ParameterSet::new(), out)
    }

    /// Runs the named template with the document root as context.
    pub fn run_named(&mut self, name: &str, out: &mut dyn Outputter) -> Result<(), ExecutionError> {
        let index = *self
            .stylesheet
            .named
            .get(name)
            .ok_or_else(|| ExecutionError::UnknownTemplate(name.to_string()))?;
        let focus = Focus::new(self.document.root());
        self.invoke(index, ParameterSet::new(), focus, out)
    }

    fn check_cancelled(&self) -> Result<(), ExecutionError> {
        if self.cancel.is_cancelled() {
            return Err(ExecutionError::Terminated("run cancelled".to_string()));
        }
        Ok(())
    }

    fn enter(&mut self) -> Result<(), ExecutionError> {
        self.check_cancelled()?;
        if self.depth >= self.config.max_depth {
            return Err(ExecutionError::RecursionLimit(self.config.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn apply_templates(
        &mut self,
        nodes: Vec<NodeRef<'d>>,
        mode: &ModeName,
        params: ParameterSet<'d>,
        out: &mut dyn Outputter,
    ) -> Result<(), ExecutionError> {
        let size = nodes.len();
        for (i, node) in nodes.into_iter().enumerate() {
            let focus = Focus {
                node,
                position: i + 1,
                size,
            };
            self.apply_to_node(&focus, mode, params.clone(), out)?;
        }
        Ok(())
    }

    fn apply_to_node(
        &mut self,
        focus: &Focus<'d>,
        mode: &ModeName,
        params: ParameterSet<'d>,
        out: &mut dyn Outputter,
    ) -> Result<(), ExecutionError> {
        let stylesheet = self.stylesheet;
        match stylesheet.rules.find_rule(&focus.node, mode, self.config.ambiguity)? {
            Some(rule) => {
                let index = *rule.action();
                trace!(
                    "{} matched {} in mode {}",
                    describe(&focus.node),
                    stylesheet.templates[index].label,
                    mode.label(&stylesheet.pool)
                );
                self.invoke_rule(index, *mode, params, *focus, out)
            }
            None => self.apply_builtin(focus, mode, out),
        }
    }

    fn invoke_rule(
        &mut self,
        index: usize,
        mode: ModeName,
        params: ParameterSet<'d>,
        focus: Focus<'d>,
        out: &mut dyn Outputter,
    ) -> Result<(), ExecutionError> {
        let saved = self.current.replace((index, mode));
        let result = self.invoke(index, params, focus, out);
        self.current = saved;
        result
    }

    /// What happens to a node no rule matches: the root and elements have
    /// their children processed in the same mode, text and attributes are
    /// copied, anything else produces nothing.
    fn apply_builtin(&mut self, focus: &Focus<'d>, mode: &ModeName, out: &mut dyn Outputter) -> Result<(), ExecutionError> {
        trace!("{} uses the built-in rule", describe(&focus.node));
        match focus.node.kind() {
            NodeKind::Root | NodeKind::Element => self.walk_builtin(focus.node, mode, out),
            NodeKind::Text | NodeKind::Attribute => out.text(&focus.node.string_value()),
            _ => Ok(()),
        }
    }

    /// Processes the children of `start`, descending through every element
    /// that also falls to the built-in rule. The descent keeps its own stack
    /// of sibling lists, so source depth never counts toward `max_depth`;
    /// only templates found on the way nest.
    fn walk_builtin(&mut self, start: NodeRef<'d>, mode: &ModeName, out: &mut dyn Outputter) -> Result<(), ExecutionError> {
        let stylesheet = self.stylesheet;
        let mut pending: Vec<(Vec<NodeRef<'d>>, usize)> = vec![(start.children().collect(), 0)];
        loop {
            let Some((siblings, next)) = pending.last_mut() else {
                return Ok(());
            };
            let Some(&node) = siblings.get(*next) else {
                pending.pop();
                continue;
            };
            *next += 1;
            let focus = Focus {
                node,
                position: *next,
                size: siblings.len(),
            };

            self.check_cancelled()?;
            match stylesheet.rules.find_rule(&node, mode, self.config.ambiguity)? {
                Some(rule) => {
                    let index = *rule.action();
                    trace!(
                        "{} matched {} in mode {}",
                        describe(&node),
                        stylesheet.templates[index].label,
                        mode.label(&stylesheet.pool)
                    );
                    self.invoke_rule(index, *mode, ParameterSet::new(), focus, out)?;
                }
                None => match node.kind() {
                    NodeKind::Element => pending.push((node.children().collect(), 0)),
                    NodeKind::Text | NodeKind::Attribute => out.text(&node.string_value())?,
                    _ => {}
                },
            }
        }
    }

    fn apply_imports(
        &mut self,
        focus: &Focus<'d>,
        params: ParameterSet<'d>,
        out: &mut dyn Outputter,
    ) -> Result<(), ExecutionError> {
        let (index, mode) = self.current.ok_or(ExecutionError::NoCurrentRule)?;
        let stylesheet = self.stylesheet;
        let template = &stylesheet.templates[index];
        let imported = stylesheet.rules.find_rule_in_range(
            &focus.node,
            &mode,
            template.min_import_precedence,
            template.precedence - 1,
        );
        match imported {
            Some(rule) => self.invoke_rule(*rule.action(), mode, params, *focus, out),
            None => self.apply_builtin(focus, &mode, out),
        }
    }

    /// Runs template `index` in a fresh frame, looping over its tail calls.
    fn invoke(
        &mut self,
        index: usize,
        params: ParameterSet<'d>,
        focus: Focus<'d>,
        out: &mut dyn Outputter,
    ) -> Result<(), ExecutionError> {
        self.enter()?;
        self.bindery.open_frame(params);
        let result = self.invoke_in_frame(index, focus, out);
        self.bindery.close_frame();
        self.leave();
        result
    }

    fn invoke_in_frame(
        &mut self,
        mut index: usize,
        mut focus: Focus<'d>,
        out: &mut dyn Outputter,
    ) -> Result<(), ExecutionError> {
        let stylesheet = self.stylesheet;
        loop {
            let template = &stylesheet.templates[index];
            self.bind_params(template, &focus)?;
            match self.run_block(&template.body, &focus, out)? {
                Flow::Continue => return Ok(()),
                Flow::TailCall {
                    target,
                    params,
                    focus: next,
                } => {
                    self.check_cancelled()?;
                    self.bindery.reset_frame(params);
                    index = target;
                    focus = next;
                }
            }
        }
    }

    fn bind_params(&mut self, template: &'s CompiledTemplate, focus: &Focus<'d>) -> Result<(), ExecutionError> {
        for param in &template.params {
            if !self.bindery.use_parameter(&param.name, param.slot)? {
                let value = self.evaluate_source(&param.default, focus)?;
                self.bindery.set_local(param.slot, value)?;
            }
        }
        Ok(())
    }

    fn parameter_set(&mut self, params: &'s [CompiledParam], focus: &Focus<'d>) -> Result<ParameterSet<'d>, ExecutionError> {
        let mut set = ParameterSet::new();
        for param in params {
            let value = self.evaluate_source(&param.value, focus)?;
            set.put(Arc::clone(&param.name), value);
        }
        Ok(set)
    }

    fn evaluate_source(&mut self, source: &'s ValueSource, focus: &Focus<'d>) -> Result<Value<'d>, ExecutionError> {
        match source {
            ValueSource::Select(expr) => expr.evaluate(focus, self),
            ValueSource::Body(ops) => Ok(Value::Text(self.text_of(ops, focus)?)),
            ValueSource::Empty => Ok(Value::Text(String::new())),
        }
    }

    /// The text `ops` would write.
    fn text_of(&mut self, ops: &'s [Op], focus: &Focus<'d>) -> Result<String, ExecutionError> {
        let mut collector = TextCollector::new();
        self.run_to_end(ops, focus, &mut collector)?;
        Ok(collector.into_text())
    }

    /// Runs a block whose tail calls, if any, are ordinary calls.
    fn run_to_end(&mut self, ops: &'s [Op], focus: &Focus<'d>, out: &mut dyn Outputter) -> Result<(), ExecutionError> {
        match self.run_block(ops, focus, out)? {
            Flow::Continue => Ok(()),
            Flow::TailCall { target, params, focus } => self.invoke(target, params, focus, out),
        }
    }

    fn run_block(&mut self, ops: &'s [Op], focus: &Focus<'d>, out: &mut dyn Outputter) -> Result<Flow<'d>, ExecutionError> {
        for op in ops {
            match op {
                Op::ApplyTemplates { select, mode, params } => {
                    let nodes = match select {
                        Some(expr) => expr.evaluate(focus, self)?.into_nodes()?,
                        None => focus.node.children().collect(),
                    };
                    let params = self.parameter_set(params, focus)?;
                    self.apply_templates(nodes, mode, params, out)?;
                }
                Op::ApplyImports { params } => {
                    let params = self.parameter_set(params, focus)?;
                    self.apply_imports(focus, params, out)?;
                }
                Op::CallTemplate {
                    target,
                    params,
                    context,
                    tail,
                } => {
                    let callee_focus = match context {
                        Some(expr) => match expr.evaluate(focus, self)?.into_nodes()?.first() {
                            Some(node) => Focus::new(*node),
                            None => continue,
                        },
                        None => *focus,
                    };
                    let params = self.parameter_set(params, focus)?;
                    if *tail {
                        return Ok(Flow::TailCall {
                            target: *target,
                            params,
                            focus: callee_focus,
                        });
                    }
                    self.invoke(*target, params, callee_focus, out)?;
                }
                Op::Variable { slot, value } => {
                    let value = self.evaluate_source(value, focus)?;
                    self.bindery.set_local(*slot, value)?;
                }
                Op::Text(text) => out.text(text)?,
                Op::ValueOf(expr) => {
                    let text = expr.evaluate(focus, self)?.string_value();
                    out.text(&text)?;
                }
                Op::Element {
                    name,
                    namespaces,
                    attributes,
                    body,
                } => {
                    out.start_element(*name)?;
                    for namespace in namespaces {
                        out.namespace(*namespace)?;
                    }
                    for (attribute, expr) in attributes {
                        let value = expr.evaluate(focus, self)?.string_value();
                        out.attribute(*attribute, &value)?;
                    }
                    self.run_to_end(body, focus, out)?;
                    out.end_element()?;
                }
                Op::If { test, body } => {
                    if test.evaluate(focus, self)?.to_boolean() {
                        if let flow @ Flow::TailCall { .. } = self.run_block(body, focus, out)? {
                            return Ok(flow);
                        }
                    }
                }
                Op::Choose { whens, otherwise } => {
                    let mut chosen = otherwise;
                    for (test, body) in whens {
                        if test.evaluate(focus, self)?.to_boolean() {
                            chosen = body;
                            break;
                        }
                    }
                    if let flow @ Flow::TailCall { .. } = self.run_block(chosen, focus, out)? {
                        return Ok(flow);
                    }
                }
                Op::ForEach { select, body } => {
                    let nodes = select.evaluate(focus, self)?.into_nodes()?;
                    let saved = self.current.take();
                    let result = self.for_each(nodes, body, out);
                    self.current = saved;
                    result?;
                }
                Op::Number {
                    level,
                    count,
                    from,
                    value,
                } => {
                    let text = match value {
                        Some(expr) => {
                            let n = expr.evaluate(focus, self)?.to_number();
                            format_number(n.round())
                        }
                        None => number_text(&focus.node, *level, count.as_ref(), from.as_ref()),
                    };
                    out.text(&text)?;
                }
                Op::Message {
                    select,
                    body,
                    terminate,
                } => {
                    let mut text = match select {
                        Some(expr) => expr.evaluate(focus, self)?.string_value(),
                        None => String::new(),
                    };
                    if !body.is_empty() {
                        text.push_str(&self.text_of(body, focus)?);
                    }
                    info!(target: "stylus::message", "{}", text);
                    self.messages.push(text.clone());
                    if *terminate {
                        return Err(ExecutionError::Terminated(text));
                    }
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn for_each(&mut self, nodes: Vec<NodeRef<'d>>, body: &'s [Op], out: &mut dyn Outputter) -> Result<(), ExecutionError> {
        let size = nodes.len();
        for (i, node) in nodes.into_iter().enumerate() {
            let focus = Focus {
                node,
                position: i + 1,
                size,
            };
            self.run_to_end(body, &focus, out)?;
        }
        Ok(())
    }

    /// The value of a global, evaluating it on first use with the document
    /// root as context.
    fn global(&mut self, index: usize) -> Result<Value<'d>, ExecutionError> {
        let stylesheet = self.stylesheet;
        let global = stylesheet
            .globals
            .get(index)
            .ok_or_else(|| ExecutionError::type_error(format!("no global variable {}", index)))?;
        match self.bindery.global_state(index) {
            Some(GlobalState::Ready(value)) => return Ok(value.clone()),
            Some(GlobalState::Evaluating) => return Err(ExecutionError::CircularVariable(global.name.clone())),
            _ => {}
        }
        if global.is_param {
            if let Some(value) = self.supplied.get(&global.name).cloned() {
                self.bindery.finish_global(index, value.clone());
                return Ok(value);
            }
        }

        trace!("Evaluating global ${}", global.name);
        self.bindery.begin_global(index);
        self.bindery.open_frame(ParameterSet::new());
        let focus = Focus::new(self.document.root());
        let result = self.evaluate_source(&global.value, &focus);
        self.bindery.close_frame();
        match result {
            Ok(value) => {
                self.bindery.finish_global(index, value.clone());
                Ok(value)
            }
            Err(err) => {
                self.bindery.abandon_global(index);
                Err(err)
            }
        }
    }
}

impl<'d> Variables<'d> for Executor<'_, 'd> {
    fn value(&mut self, variable: VariableRef) -> Result<Value<'d>, ExecutionError> {
        match variable {
            VariableRef::Local(slot) => self.bindery.local(slot),
            VariableRef::Global(index) => self.global(index),
        }
    }
}

/// The formatted number of `node` at `level`. A node with no number
/// produces the empty string.
fn number_text(node: &NodeRef<'_>, level: NumberLevel, count: Option<&Pattern>, from: Option<&Pattern>) -> String {
    let count_test = |n: &NodeRef<'_>| count.is_some_and(|p| p.matches(n));
    let from_test = |n: &NodeRef<'_>| from.is_some_and(|p| p.matches(n));
    let count_predicate = count.is_some().then_some(&count_test as NodePredicate<'_>);
    let from_predicate = from.is_some().then_some(&from_test as NodePredicate<'_>);
    let single = |n: usize| if n == 0 { String::new() } else { n.to_string() };
    match level {
        NumberLevel::Single => single(count_single(node, count_predicate, from_predicate)),
        NumberLevel::Any => single(count_any(node, count_predicate, from_predicate)),
        NumberLevel::Multiple => count_multiple(node, count_predicate, from_predicate)
            .iter()
            .join("."),
    }
}
