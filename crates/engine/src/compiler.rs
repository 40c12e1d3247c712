//! Stylesheet compilation: import precedence, name resolution, variable
//! slot allocation, frame sizing and tail-call detection.
//!
//! Precedence is assigned by a post-order walk of the import tree: every
//! module a module imports gets a lower precedence than the module itself,
//! and a module's imports are all processed before it. A module and the
//! modules it includes form one unit that shares a precedence.
use crate::error::CompileError;
use crate::expression::{Expr, PathExpression, VariableRef, VariableScope};
use crate::instruction::{Instruction, Select, WithParam};
use crate::module::{GlobalVariable, MatchPattern, Module, Template};
use crate::stylesheet::{CompiledGlobal, CompiledParam, CompiledTemplate, Op, ParamSlot, Stylesheet, ValueSource};
use log::debug;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use stylus_names::NamePool;
use stylus_rules::{ModeName, Pattern, RuleManager, SpaceRules};

/// A module and the modules it includes, with their shared precedence.
struct Unit<'m> {
    members: Vec<&'m Module>,
    precedence: i32,
    min_import_precedence: i32,
}

/// Collects modules and compiles them into a [`Stylesheet`].
pub struct StylesheetBuilder {
    pool: Arc<NamePool>,
    modules: HashMap<String, Module>,
}

impl StylesheetBuilder {
    pub fn new(pool: Arc<NamePool>) -> Self {
        StylesheetBuilder {
            pool,
            modules: HashMap::new(),
        }
    }

    /// Adds a module, replacing any earlier module with the same name.
    pub fn add_module(&mut self, module: Module) -> &mut Self {
        self.modules.insert(module.name.clone(), module);
        self
    }

    pub fn module(mut self, module: Module) -> Self {
        self.add_module(module);
        self
    }

    /// Compiles the stylesheet whose principal module is `principal`.
    pub fn compile(&self, principal: &str) -> Result<Stylesheet, CompileError> {
        let mut units = Vec::new();
        let mut counter = 0;
        self.assign_precedence(principal, &mut counter, &mut Vec::new(), &mut units)?;

        let mut declared = Vec::new();
        for unit in &units {
            for module in &unit.members {
                for template in &module.templates {
                    declared.push((template, *module, unit));
                }
            }
        }

        let named = self.resolve_named_templates(&declared)?;
        let (globals_declared, global_names) = self.resolve_globals(&units)?;

        let compiler = Compiler {
            pool: &self.pool,
            named: &named,
            global_names: &global_names,
        };

        let mut rules = RuleManager::new(Arc::clone(&self.pool));
        let mut templates = Vec::with_capacity(declared.len());
        for (index, (template, module, unit)) in declared.iter().enumerate() {
            let compiled = compiler.template(index, template, module, unit)?;
            if let Some(pattern) = &template.pattern {
                let pattern = match pattern {
                    MatchPattern::Text(text) => Pattern::parse(text, &self.pool, &module.namespaces)?,
                    MatchPattern::Compiled(pattern) => pattern.clone(),
                };
                let mode = compiler.mode(template.mode.as_deref(), module)?;
                rules.add_rule(
                    &pattern,
                    index,
                    mode,
                    unit.precedence,
                    template.priority,
                    Some(module.name.as_str()),
                )?;
            } else if template.name.is_none() {
                return Err(CompileError::AnonymousTemplate);
            } else if let Some(mode) = &template.mode {
                rules.declare_mode(compiler.mode(Some(mode), module)?);
            }
            templates.push(compiled);
        }

        let mut globals = Vec::with_capacity(globals_declared.len());
        for (global, module) in globals_declared {
            let mut scope = Scope::new(&global_names);
            let value = compiler.value(global.select.as_ref(), &global.body, module, &mut scope)?;
            globals.push(CompiledGlobal {
                name: global.name.clone(),
                is_param: global.is_param,
                value,
                frame_size: scope.max,
            });
        }

        let mut space = SpaceRules::new(Arc::clone(&self.pool));
        for unit in &units {
            for module in &unit.members {
                for tests in &module.strip_space {
                    space.add_list(tests, false, unit.precedence, &module.namespaces)?;
                }
                for tests in &module.preserve_space {
                    space.add_list(tests, true, unit.precedence, &module.namespaces)?;
                }
            }
        }

        let max_frame_size = templates
            .iter()
            .map(|t| t.frame_size)
            .chain(globals.iter().map(|g| g.frame_size))
            .max()
            .unwrap_or(0);
        debug!(
            "Compiled '{}': {} templates, {} rules, {} globals, frame size {}",
            principal,
            templates.len(),
            rules.rule_count(),
            globals.len(),
            max_frame_size
        );

        Ok(Stylesheet {
            pool: Arc::clone(&self.pool),
            templates,
            named,
            rules,
            globals,
            global_names,
            space,
            max_frame_size,
        })
    }

    fn module_named(&self, name: &str) -> Result<&Module, CompileError> {
        self.modules
            .get(name)
            .ok_or_else(|| CompileError::UnknownModule(name.to_string()))
    }

    fn assign_precedence<'m>(
        &'m self,
        name: &str,
        counter: &mut i32,
        active: &mut Vec<String>,
        units: &mut Vec<Unit<'m>>,
    ) -> Result<(), CompileError> {
        if active.iter().any(|a| a == name) {
            return Err(CompileError::CircularModule(name.to_string()));
        }
        let mut members = Vec::new();
        self.collect_includes(name, &mut Vec::new(), &mut members)?;
        if let Some(member) = members.iter().find(|m| active.contains(&m.name)) {
            return Err(CompileError::CircularModule(member.name.clone()));
        }

        let mark = active.len();
        active.extend(members.iter().map(|m| m.name.clone()));
        let min_import_precedence = *counter;
        for member in &members {
            for import in &member.imports {
                self.assign_precedence(import, counter, active, units)?;
            }
        }
        active.truncate(mark);

        let precedence = *counter;
        *counter += 1;
        debug!(
            "Module '{}' has precedence {} (imports from {})",
            name, precedence, min_import_precedence
        );
        units.push(Unit {
            members,
            precedence,
            min_import_precedence,
        });
        Ok(())
    }

    /// `name` followed by everything it includes, depth first. A module
    /// reached twice is taken once; a module that includes itself is an
    /// error.
    fn collect_includes<'m>(
        &'m self,
        name: &str,
        path: &mut Vec<String>,
        members: &mut Vec<&'m Module>,
    ) -> Result<(), CompileError> {
        if path.iter().any(|p| p == name) {
            return Err(CompileError::CircularModule(name.to_string()));
        }
        let module = self.module_named(name)?;
        if members.iter().any(|m| m.name == module.name) {
            return Ok(());
        }
        members.push(module);
        path.push(name.to_string());
        for include in &module.includes {
            self.collect_includes(include, path, members)?;
        }
        path.pop();
        Ok(())
    }

    fn resolve_named_templates(
        &self,
        declared: &[(&Template, &Module, &Unit<'_>)],
    ) -> Result<HashMap<String, usize>, CompileError> {
        let mut named: HashMap<String, (usize, i32)> = HashMap::new();
        for (index, (template, _, unit)) in declared.iter().enumerate() {
            let Some(name) = &template.name else { continue };
            match named.entry(name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert((index, unit.precedence));
                }
                Entry::Occupied(mut slot) => {
                    let (_, existing) = *slot.get();
                    if existing == unit.precedence {
                        return Err(CompileError::DuplicateTemplate {
                            name: name.clone(),
                            precedence: existing,
                        });
                    }
                    if unit.precedence > existing {
                        slot.insert((index, unit.precedence));
                    }
                }
            }
        }
        Ok(named.into_iter().map(|(name, (index, _))| (name, index)).collect())
    }

    /// Picks the highest-precedence declaration of each global and numbers
    /// the survivors in order of first declaration.
    #[allow(clippy::type_complexity)]
    fn resolve_globals<'m>(
        &'m self,
        units: &[Unit<'m>],
    ) -> Result<(Vec<(&'m GlobalVariable, &'m Module)>, HashMap<String, usize>), CompileError> {
        let mut chosen: HashMap<&str, (&'m GlobalVariable, &'m Module, i32)> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for unit in units {
            for &module in &unit.members {
                for global in &module.globals {
                    match chosen.get(global.name.as_str()).map(|(_, _, p)| *p) {
                        Some(existing) if existing == unit.precedence => {
                            return Err(CompileError::DuplicateGlobal {
                                name: global.name.clone(),
                                precedence: existing,
                            });
                        }
                        Some(existing) if existing > unit.precedence => {}
                        Some(_) => {
                            chosen.insert(&global.name, (global, module, unit.precedence));
                        }
                        None => {
                            order.push(&global.name);
                            chosen.insert(&global.name, (global, module, unit.precedence));
                        }
                    }
                }
            }
        }
        let mut globals = Vec::with_capacity(order.len());
        let mut names = HashMap::with_capacity(order.len());
        for name in order {
            if let Some((global, module, _)) = chosen.get(name) {
                names.insert(name.to_string(), globals.len());
                globals.push((*global, *module));
            }
        }
        Ok((globals, names))
    }
}

/// The variables visible at one point of a body.
struct Scope<'g> {
    globals: &'g HashMap<String, usize>,
    /// Innermost declaration last, so later declarations shadow earlier ones.
    locals: Vec<(String, usize)>,
    next: usize,
    max: usize,
}

impl<'g> Scope<'g> {
    fn new(globals: &'g HashMap<String, usize>) -> Self {
        Scope {
            globals,
            locals: Vec::new(),
            next: 0,
            max: 0,
        }
    }

    fn declare(&mut self, name: &str) -> usize {
        let slot = self.next;
        self.next += 1;
        self.max = self.max.max(self.next);
        self.locals.push((name.to_string(), slot));
        slot
    }

    fn mark(&self) -> (usize, usize) {
        (self.locals.len(), self.next)
    }

    /// Leaves a block: its variables go out of scope and their slots can be
    /// reused by later siblings.
    fn restore(&mut self, (locals, next): (usize, usize)) {
        self.locals.truncate(locals);
        self.next = next;
    }
}

impl VariableScope for Scope<'_> {
    fn resolve(&self, name: &str) -> Option<VariableRef> {
        self.locals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, slot)| VariableRef::Local(*slot))
            .or_else(|| self.globals.get(name).map(|&g| VariableRef::Global(g)))
    }
}

struct Compiler<'a> {
    pool: &'a NamePool,
    named: &'a HashMap<String, usize>,
    global_names: &'a HashMap<String, usize>,
}

impl Compiler<'_> {
    fn template(
        &self,
        index: usize,
        template: &Template,
        module: &Module,
        unit: &Unit<'_>,
    ) -> Result<CompiledTemplate, CompileError> {
        let mut scope = Scope::new(self.global_names);
        let mut params = Vec::with_capacity(template.params.len());
        for param in &template.params {
            let default = self.value(param.select.as_ref(), &param.body, module, &mut scope)?;
            let slot = scope.declare(&param.name);
            params.push(ParamSlot {
                name: Arc::from(param.name.as_str()),
                slot,
                default,
            });
        }
        let mut body = self.block(&template.body, module, &mut scope)?;
        let tail_recursive = mark_tail_calls(&mut body, index);
        let label = template.label();
        if tail_recursive {
            debug!("Template {} is tail-recursive", label);
        }
        Ok(CompiledTemplate {
            label,
            name: template.name.clone(),
            module: module.name.clone(),
            precedence: unit.precedence,
            min_import_precedence: unit.min_import_precedence,
            params,
            body,
            frame_size: scope.max,
            tail_recursive,
        })
    }

    fn mode(&self, mode: Option<&str>, module: &Module) -> Result<ModeName, CompileError> {
        Ok(match mode {
            None => ModeName::Default,
            Some(name) => ModeName::Named(
                self.pool
                    .allocate_lexical(name, &module.namespaces, false)?
                    .fingerprint(),
            ),
        })
    }

    fn expr(&self, select: &Select, module: &Module, scope: &Scope<'_>) -> Result<Expr, CompileError> {
        let expr: Expr = match select {
            Select::Path(text) => Arc::new(PathExpression::parse(text, self.pool, &module.namespaces)?),
            Select::Custom(expr) => Arc::clone(expr),
        };
        Ok(expr.bind(scope)?.unwrap_or(expr))
    }

    fn value(
        &self,
        select: Option<&Select>,
        body: &[Instruction],
        module: &Module,
        scope: &mut Scope<'_>,
    ) -> Result<ValueSource, CompileError> {
        Ok(match select {
            Some(select) => ValueSource::Select(self.expr(select, module, scope)?),
            None if body.is_empty() => ValueSource::Empty,
            None => ValueSource::Body(self.block(body, module, scope)?),
        })
    }

    fn params(
        &self,
        params: &[WithParam],
        module: &Module,
        scope: &mut Scope<'_>,
    ) -> Result<Vec<CompiledParam>, CompileError> {
        params
            .iter()
            .map(|p| {
                Ok(CompiledParam {
                    name: Arc::from(p.name.as_str()),
                    value: self.value(p.select.as_ref(), &p.body, module, scope)?,
                })
            })
            .collect()
    }

    fn pattern(&self, text: Option<&String>, module: &Module) -> Result<Option<Pattern>, CompileError> {
        text.map(|t| Pattern::parse(t, self.pool, &module.namespaces))
            .transpose()
            .map_err(CompileError::from)
    }

    /// Compiles a block; variables declared in it are out of scope after it.
    fn block(&self, body: &[Instruction], module: &Module, scope: &mut Scope<'_>) -> Result<Vec<Op>, CompileError> {
        let mark = scope.mark();
        let ops = body
            .iter()
            .map(|instruction| self.instruction(instruction, module, scope))
            .collect();
        scope.restore(mark);
        ops
    }

    fn instruction(&self, instruction: &Instruction, module: &Module, scope: &mut Scope<'_>) -> Result<Op, CompileError> {
        Ok(match instruction {
            Instruction::ApplyTemplates { select, mode, params } => Op::ApplyTemplates {
                select: select.as_ref().map(|s| self.expr(s, module, scope)).transpose()?,
                mode: self.mode(mode.as_deref(), module)?,
                params: self.params(params, module, scope)?,
            },
            Instruction::ApplyImports { params } => Op::ApplyImports {
                params: self.params(params, module, scope)?,
            },
            Instruction::CallTemplate { name, params, context } => Op::CallTemplate {
                target: *self
                    .named
                    .get(name)
                    .ok_or_else(|| CompileError::UnknownTemplate(name.clone()))?,
                params: self.params(params, module, scope)?,
                context: context.as_ref().map(|s| self.expr(s, module, scope)).transpose()?,
                tail: false,
            },
            Instruction::Variable { name, select, body } => {
                let value = self.value(select.as_ref(), body, module, scope)?;
                Op::Variable {
                    slot: scope.declare(name),
                    value,
                }
            }
            Instruction::Text(text) => Op::Text(text.clone()),
            Instruction::ValueOf(select) => Op::ValueOf(self.expr(select, module, scope)?),
            Instruction::Element { name, attributes, body } => {
                let code = self.pool.allocate_lexical(name, &module.namespaces, true)?;
                let mut namespaces = Vec::new();
                let mut declare = |code| -> Result<(), CompileError> {
                    let uri = self.pool.uri(code)?;
                    if !uri.is_empty() {
                        let ns = self.pool.allocate_namespace_code(&self.pool.prefix(code)?, &uri)?;
                        if !namespaces.contains(&ns) {
                            namespaces.push(ns);
                        }
                    }
                    Ok(())
                };
                declare(code)?;
                let mut compiled_attributes = Vec::with_capacity(attributes.len());
                for (attribute, select) in attributes {
                    let attribute_code = self.pool.allocate_lexical(attribute, &module.namespaces, false)?;
                    declare(attribute_code)?;
                    compiled_attributes.push((attribute_code, self.expr(select, module, scope)?));
                }
                Op::Element {
                    name: code,
                    namespaces,
                    attributes: compiled_attributes,
                    body: self.block(body, module, scope)?,
                }
            }
            Instruction::If { test, body } => Op::If {
                test: self.expr(test, module, scope)?,
                body: self.block(body, module, scope)?,
            },
            Instruction::Choose { whens, otherwise } => Op::Choose {
                whens: whens
                    .iter()
                    .map(|(test, body)| Ok((self.expr(test, module, scope)?, self.block(body, module, scope)?)))
                    .collect::<Result<Vec<_>, CompileError>>()?,
                otherwise: self.block(otherwise, module, scope)?,
            },
            Instruction::ForEach { select, body } => Op::ForEach {
                select: self.expr(select, module, scope)?,
                body: self.block(body, module, scope)?,
            },
            Instruction::Number {
                level,
                count,
                from,
                value,
            } => Op::Number {
                level: *level,
                count: self.pattern(count.as_ref(), module)?,
                from: self.pattern(from.as_ref(), module)?,
                value: value.as_ref().map(|s| self.expr(s, module, scope)).transpose()?,
            },
            Instruction::Message {
                select,
                body,
                terminate,
            } => Op::Message {
                select: select.as_ref().map(|s| self.expr(s, module, scope)).transpose()?,
                body: self.block(body, module, scope)?,
                terminate: *terminate,
            },
        })
    }
}

/// Marks calls to template `target` that are the last thing its body does:
/// the final instruction, or the final instruction of a branch of a final
/// `if` or `choose`. Anything else that runs code after its children
/// (elements, loops, messages) keeps the call an ordinary one.
fn mark_tail_calls(ops: &mut [Op], target: usize) -> bool {
    match ops.last_mut() {
        Some(Op::CallTemplate { target: t, tail, .. }) if *t == target => {
            *tail = true;
            true
        }
        Some(Op::If { body, .. }) => mark_tail_calls(body, target),
        Some(Op::Choose { whens, otherwise }) => {
            let mut marked = false;
            for (_, body) in whens.iter_mut() {
                marked |= mark_tail_calls(body, target);
            }
            marked | mark_tail_calls(otherwise, target)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction as I;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn builder() -> StylesheetBuilder {
        StylesheetBuilder::new(NamePool::new_shared())
    }

    fn precedence_of(stylesheet: &Stylesheet, name: &str) -> i32 {
        stylesheet.named_template(name).unwrap().precedence()
    }

    #[test]
    fn imports_rank_below_their_importer_in_post_order() {
        init();
        // main imports a then b; a imports c. Post-order: c, a, b, main.
        let stylesheet = builder()
            .module(Module::new("main").import("a").import("b").template(Template::named("main")))
            .module(Module::new("a").import("c").template(Template::named("a")))
            .module(Module::new("b").template(Template::named("b")))
            .module(Module::new("c").template(Template::named("c")))
            .compile("main")
            .unwrap();
        assert_eq!(precedence_of(&stylesheet, "c"), 0);
        assert_eq!(precedence_of(&stylesheet, "a"), 1);
        assert_eq!(precedence_of(&stylesheet, "b"), 2);
        assert_eq!(precedence_of(&stylesheet, "main"), 3);
        assert_eq!(stylesheet.named_template("main").unwrap().min_import_precedence(), 0);
        assert_eq!(stylesheet.named_template("b").unwrap().min_import_precedence(), 2);
        assert_eq!(stylesheet.named_template("a").unwrap().min_import_precedence(), 0);
    }

    #[test]
    fn includes_share_precedence() {
        let stylesheet = builder()
            .module(Module::new("main").include("inc").import("imp").template(Template::named("main")))
            .module(Module::new("inc").import("deep").template(Template::named("inc")))
            .module(Module::new("imp").template(Template::named("imp")))
            .module(Module::new("deep").template(Template::named("deep")))
            .compile("main")
            .unwrap();
        assert_eq!(precedence_of(&stylesheet, "main"), precedence_of(&stylesheet, "inc"));
        assert!(precedence_of(&stylesheet, "deep") < precedence_of(&stylesheet, "main"));
        assert!(precedence_of(&stylesheet, "imp") < precedence_of(&stylesheet, "main"));
        assert_eq!(stylesheet.named_template("inc").unwrap().module(), "inc");
    }

    #[test]
    fn higher_precedence_named_template_overrides() {
        let stylesheet = builder()
            .module(Module::new("main").import("lib").template(Template::named("t").body(vec![I::text("main")])))
            .module(Module::new("lib").template(Template::named("t").body(vec![I::text("lib")])))
            .compile("main")
            .unwrap();
        assert_eq!(stylesheet.named_template("t").unwrap().module(), "main");

        let duplicate = builder()
            .module(
                Module::new("main")
                    .template(Template::named("t"))
                    .template(Template::named("t")),
            )
            .compile("main");
        assert!(matches!(duplicate, Err(CompileError::DuplicateTemplate { .. })));
    }

    #[test]
    fn module_graph_errors() {
        let circular = builder()
            .module(Module::new("a").import("b"))
            .module(Module::new("b").import("a"))
            .compile("a");
        assert!(matches!(circular, Err(CompileError::CircularModule(_))));

        let self_include = builder().module(Module::new("a").include("a")).compile("a");
        assert!(matches!(self_include, Err(CompileError::CircularModule(_))));

        let missing = builder().module(Module::new("a").import("nowhere")).compile("a");
        assert!(matches!(missing, Err(CompileError::UnknownModule(name)) if name == "nowhere"));
    }

    #[test]
    fn diamond_includes_are_taken_once() {
        let stylesheet = builder()
            .module(Module::new("main").include("x").include("y"))
            .module(Module::new("x").include("shared"))
            .module(Module::new("y").include("shared"))
            .module(Module::new("shared").template(Template::named("s")))
            .compile("main")
            .unwrap();
        assert_eq!(stylesheet.templates().len(), 1);
    }

    #[test]
    fn self_call_in_tail_position_is_detected() {
        let tail = Template::named("walk").body(vec![
            I::apply_templates(),
            I::call_template("walk").on("following-sibling::*[1]"),
        ]);
        let through_if = Template::named("count").param("n", Some("0".into())).body(vec![I::when(
            "*",
            vec![I::call_template("count").with_param("n", "$n")],
        )]);
        let not_last = Template::named("again").body(vec![I::call_template("again"), I::text("after")]);
        let wrapped = Template::named("wrapped").body(vec![I::element("x", vec![I::call_template("wrapped")])]);
        let in_loop = Template::named("looped").body(vec![I::for_each("*", vec![I::call_template("looped")])]);
        let other = Template::named("other").body(vec![I::call_template("walk")]);

        let stylesheet = builder()
            .module(
                Module::new("main")
                    .template(tail)
                    .template(through_if)
                    .template(not_last)
                    .template(wrapped)
                    .template(in_loop)
                    .template(other),
            )
            .compile("main")
            .unwrap();
        let tail_recursive = |name: &str| stylesheet.named_template(name).unwrap().is_tail_recursive();
        assert!(tail_recursive("walk"));
        assert!(tail_recursive("count"));
        assert!(!tail_recursive("again"));
        assert!(!tail_recursive("wrapped"));
        assert!(!tail_recursive("looped"));
        assert!(!tail_recursive("other"));
    }

    #[test]
    fn frames_are_sized_for_the_largest_body() {
        let small = Template::named("small").body(vec![I::variable("a", "1")]);
        // Sibling blocks reuse slots: p, then at most x and y live together.
        let large = Template::named("large").param("p", None).body(vec![
            I::when("1", vec![I::variable("x", "1"), I::variable("y", "$x")]),
            I::when("1", vec![I::variable("z", "$p")]),
        ]);
        let stylesheet = builder()
            .module(
                Module::new("main")
                    .template(small)
                    .template(large)
                    .global(GlobalVariable::variable("g", "1")),
            )
            .compile("main")
            .unwrap();
        assert_eq!(stylesheet.named_template("small").unwrap().frame_size(), 1);
        assert_eq!(stylesheet.named_template("large").unwrap().frame_size(), 3);
        assert_eq!(stylesheet.max_frame_size(), 3);
    }

    #[test]
    fn undeclared_names_are_compile_errors() {
        let unknown_variable = builder()
            .module(Module::new("main").template(Template::named("t").body(vec![I::value_of("$nope")])))
            .compile("main");
        assert!(matches!(unknown_variable, Err(CompileError::UndeclaredVariable(_))));

        // A variable is not in scope in its own initializer or after its block.
        let out_of_scope = builder()
            .module(Module::new("main").template(Template::named("t").body(vec![
                I::when("1", vec![I::variable("v", "1")]),
                I::value_of("$v"),
            ])))
            .compile("main");
        assert!(matches!(out_of_scope, Err(CompileError::UndeclaredVariable(_))));

        let unknown_template = builder()
            .module(Module::new("main").template(Template::named("t").body(vec![I::call_template("u")])))
            .compile("main");
        assert!(matches!(unknown_template, Err(CompileError::UnknownTemplate(_))));

        let anonymous = builder().module(Module::new("main").template(Template::default())).compile("main");
        assert!(matches!(anonymous, Err(CompileError::AnonymousTemplate)));
    }

    #[test]
    fn globals_resolve_by_precedence() {
        let stylesheet = builder()
            .module(
                Module::new("main")
                    .import("lib")
                    .global(GlobalVariable::variable("shared", "'main'"))
                    .template(Template::named("t").body(vec![I::value_of("$shared"), I::value_of("$only")])),
            )
            .module(
                Module::new("lib")
                    .global(GlobalVariable::variable("shared", "'lib'"))
                    .global(GlobalVariable::param("only", None)),
            )
            .compile("main")
            .unwrap();
        let mut names: Vec<&str> = stylesheet.global_names().collect();
        names.sort();
        assert_eq!(names, ["only", "shared"]);
    }

    #[test]
    fn match_templates_become_rules() {
        let stylesheet = builder()
            .module(
                Module::new("main")
                    .namespace("x", "urn:x")
                    .template(Template::matching("a | x:b").mode("m"))
                    .template(Template::matching("c").priority(2.0))
                    .strip_space("*")
                    .preserve_space("x:pre"),
            )
            .compile("main")
            .unwrap();
        assert_eq!(stylesheet.rules().rule_count(), 3);
        assert!(stylesheet.space_rules().strips_anything());

        let bad_pattern = builder()
            .module(Module::new("main").template(Template::matching("a[")))
            .compile("main");
        assert!(matches!(bad_pattern, Err(CompileError::Pattern(_))));
    }
}
