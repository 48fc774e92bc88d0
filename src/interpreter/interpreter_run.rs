// Copyright (c) Chris Gunn.
// Licensed under the MIT license.

use std::{
    fs, mem,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Error};
use tracing::debug;

use crate::{
    ast::{
        AssignOp, BinaryOp, ConfFile, DirectiveKind, Expr, ExprAssign, ExprKind, SourceLocationSpan, Statement,
        StatementClass, StatementDecl, StatementDirective, StatementKind, StatementScope,
    },
    parser::Parser,
    process_conf::ParseOptions,
    scope::{
        Entry, Instance, MergePolicy, Scope, TypeDef, Value, TYPE_FLOAT, TYPE_INT, TYPE_OBJECT, TYPE_STRING,
    },
};

use super::SourceContext;

pub struct InterpreterRun<'a> {
    parser: &'a Parser,
    options: &'a ParseOptions,
    context: SourceContext,
    global: Scope,
    // Open scope blocks, outermost first. Each one is already in the tree under its parent.
    open: Vec<OpenScope>,
    // Classes do not nest and cannot hold scopes, so an open class is always the innermost block.
    class: Option<OpenClass>,
    // Set by a `class Name` line without a brace. Only then may a lone `{` follow.
    brace_allowed: bool,
}

struct OpenScope {
    name: String,
    src_loc: SourceLocationSpan,
}

struct OpenClass {
    members: Scope,
    src_loc: SourceLocationSpan,
}

/// An evaluated expression: a temporary value together with its type name.
#[derive(Clone, Debug, PartialEq)]
struct Operand {
    ty: String,
    value: Value,
}

macro_rules! errwithloc {
    ($loc:expr, $fmt:expr $(, $($arg:tt)*)?) => {
        anyhow!(concat!("{}:{}:{} ", $fmt), $loc.filename, $loc.start.line, $loc.start.col, $($($arg)*)?)
    };
}

impl<'a> InterpreterRun<'a> {
    pub fn new(parser: &'a Parser, options: &'a ParseOptions, context: SourceContext) -> InterpreterRun<'a> {
        InterpreterRun {
            parser,
            options,
            context,
            global: Scope::new(""),
            open: Vec::new(),
            class: None,
            brace_allowed: false,
        }
    }

    pub fn interpret_file(mut self, file: &ConfFile) -> Result<Scope, Error> {
        for statement in &file.statements {
            self.interpret_statement(statement)?;
        }

        if let Some(class) = &self.class {
            return Err(errwithloc!(class.src_loc, "unclosed block '{}'", class.members.name()));
        }
        if let Some(block) = self.open.last() {
            return Err(errwithloc!(block.src_loc, "unclosed block '{}'", block.name));
        }

        debug!(filename = %file.filename, entries = self.global.len(), "interpreted file");
        Ok(self.global)
    }

    fn interpret_statement(&mut self, statement: &Statement) -> Result<(), Error> {
        let src_loc = &statement.src_loc;
        let brace_allowed = mem::replace(&mut self.brace_allowed, false);
        match &statement.kind {
            StatementKind::Directive(directive) => self.interpret_directive(directive, src_loc),
            StatementKind::Class(class) => {
                self.interpret_class(class, src_loc)?;
                self.brace_allowed = !class.braced;
                Ok(())
            }
            StatementKind::ScopeBegin(scope) => self.interpret_scope_begin(scope, src_loc),
            // The brace of a `class Name` line, written on its own line.
            StatementKind::BlockBegin => match brace_allowed {
                true => Ok(()),
                false => Err(errwithloc!(src_loc, "unexpected '{{'")),
            },
            StatementKind::BlockEnd => self.interpret_block_end(src_loc),
            StatementKind::Decl(decl) => self.interpret_decl(decl, src_loc),
            StatementKind::Expr(expr) => {
                let value = self.interpret_expr(expr, src_loc)?;
                debug!(loc = %src_loc, ty = %value.ty, "evaluated expression");
                Ok(())
            }
        }
    }

    fn interpret_directive(
        &mut self,
        directive: &StatementDirective,
        src_loc: &SourceLocationSpan,
    ) -> Result<(), Error> {
        if self.class.is_some() {
            return Err(errwithloc!(src_loc, "directives are not allowed inside a class"));
        }
        if !self.options.allow_includes {
            return Err(errwithloc!(src_loc, "includes are disabled"));
        }
        if self.context.depth >= self.options.max_include_depth {
            return Err(errwithloc!(
                src_loc,
                "include depth limit {} exceeded",
                self.options.max_include_depth
            ));
        }

        let path = self.context.dir.join(&directive.path);
        let input = fs::read_to_string(&path)
            .map_err(|err| errwithloc!(src_loc, "cannot read '{}': {}", directive.path, err))?;

        let canonical = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if self.context.include_stack.contains(&canonical) {
            return Err(errwithloc!(src_loc, "include cycle detected: '{}'", directive.path));
        }

        // Errors inside the included file are reported relative to the including file's name.
        let label = Path::new(src_loc.filename.as_str())
            .parent()
            .map(|dir| dir.join(&directive.path))
            .unwrap_or_else(|| PathBuf::from(&directive.path));

        debug!(path = %path.display(), kind = ?directive.kind, "including file");

        let file = self.parser.parse(&label.to_string_lossy(), &input)?;

        let mut include_stack = self.context.include_stack.clone();
        include_stack.push(canonical);
        let context = SourceContext {
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            include_stack,
            depth: self.context.depth + 1,
        };
        let included = InterpreterRun::new(self.parser, self.options, context).interpret_file(&file)?;

        let policy = match directive.kind {
            DirectiveKind::Use => MergePolicy::Override,
            DirectiveKind::Default => MergePolicy::Default,
        };
        self.current_scope_mut()?
            .merge(included, policy)
            .map_err(|err| errwithloc!(src_loc, "{}", err))
    }

    fn interpret_class(&mut self, class: &StatementClass, src_loc: &SourceLocationSpan) -> Result<(), Error> {
        if self.class.is_some() {
            return Err(errwithloc!(src_loc, "classes cannot be nested"));
        }
        self.check_new_name(&class.name, src_loc)?;

        debug!(name = %class.name, "opening class");
        self.class = Some(OpenClass {
            members: Scope::new(class.name.as_str()),
            src_loc: src_loc.clone(),
        });
        Ok(())
    }

    fn interpret_scope_begin(&mut self, scope: &StatementScope, src_loc: &SourceLocationSpan) -> Result<(), Error> {
        if self.class.is_some() {
            return Err(errwithloc!(src_loc, "scopes cannot be declared inside a class"));
        }

        let current = self.current_scope_mut()?;
        let reopened = match current.get(&scope.name) {
            Some(Entry::Scope(_)) => true,
            Some(_) => return Err(errwithloc!(src_loc, "'{}' is already declared in this scope", scope.name)),
            None => {
                Self::check_not_intrinsic(&scope.name, src_loc)?;
                current
                    .insert(Entry::Scope(Scope::new(scope.name.as_str())))
                    .map_err(|err| errwithloc!(src_loc, "{}", err))?;
                false
            }
        };

        debug!(name = %scope.name, reopened, "opening scope");
        self.open.push(OpenScope {
            name: scope.name.clone(),
            src_loc: src_loc.clone(),
        });
        Ok(())
    }

    fn interpret_block_end(&mut self, src_loc: &SourceLocationSpan) -> Result<(), Error> {
        if let Some(class) = self.class.take() {
            debug!(name = class.members.name(), "closing class");

            let mut typedef = TypeDef::new(class.members.name());
            for child in class.members.into_children() {
                if let Entry::Instance(member) = child {
                    typedef.members.insert(member.name.clone(), member);
                }
            }
            return self
                .current_scope_mut()?
                .insert(Entry::Type(typedef))
                .map_err(|err| errwithloc!(class.src_loc, "{}", err));
        }

        match self.open.pop() {
            Some(block) => {
                debug!(name = %block.name, "closing scope");
                Ok(())
            }
            None => Err(errwithloc!(src_loc, "unexpected '}}'")),
        }
    }

    fn interpret_decl(&mut self, decl: &StatementDecl, src_loc: &SourceLocationSpan) -> Result<(), Error> {
        let name_loc = src_loc.at(&decl.name_span);
        Self::check_not_intrinsic(&decl.name, &name_loc)?;

        let instance = self.instantiate(&decl.type_name, &decl.name, src_loc)?;
        self.current_scope_mut()?
            .insert(Entry::Instance(instance))
            .map_err(|err| errwithloc!(name_loc, "{}", err))?;

        if let Some(init) = &decl.init {
            let value = self.interpret_expr(init, src_loc)?;
            self.assign(&[decl.name.as_str()], value, &src_loc.at(&init.span))?;
        }
        Ok(())
    }

    fn instantiate(&self, type_name: &str, name: &str, src_loc: &SourceLocationSpan) -> Result<Instance, Error> {
        if let Some(value) = Value::default_for(type_name) {
            return Ok(Instance::new(name, type_name, value));
        }

        for scope in self.scopes() {
            match scope.get(type_name) {
                Some(Entry::Type(typedef)) => return Ok(typedef.instantiate(name)),
                Some(_) => return Err(errwithloc!(src_loc, "'{}' is not a type", type_name)),
                None => {}
            }
        }

        Err(errwithloc!(src_loc, "unknown type '{}'", type_name))
    }

    fn interpret_expr(&mut self, expr: &Expr, src_loc: &SourceLocationSpan) -> Result<Operand, Error> {
        match &expr.kind {
            ExprKind::String(value) => Ok(Operand::new(TYPE_STRING, Value::String(value.clone()))),
            ExprKind::Integer(value) => Ok(Operand::new(TYPE_INT, Value::Int(*value))),
            ExprKind::Real(value) if !value.is_finite() => {
                Err(errwithloc!(src_loc.at(&expr.span), "float literal is out of range"))
            }
            ExprKind::Real(value) => Ok(Operand::new(TYPE_FLOAT, Value::Float(*value))),
            ExprKind::Name(name) => self.read_path(&[name.as_str()], &src_loc.at(&expr.span)),
            ExprKind::Member(member) => match expr.as_path() {
                Some(path) => self.read_path(&path, &src_loc.at(&expr.span)),
                None => {
                    let object = self.interpret_expr(&member.object, src_loc)?;
                    Self::member_of(object, &member.member, &src_loc.at(&expr.span))
                }
            },
            ExprKind::Neg(operand) => {
                let operand = self.interpret_expr(operand, src_loc)?;
                Self::negate(operand, &src_loc.at(&expr.span))
            }
            ExprKind::Binary(binary) => {
                let left = self.interpret_expr(&binary.left, src_loc)?;
                let right = self.interpret_expr(&binary.right, src_loc)?;
                Self::binary(binary.op, left, right, &src_loc.at(&expr.span))
            }
            ExprKind::Assign(assign) => self.interpret_assign(assign, src_loc),
        }
    }

    fn interpret_assign(&mut self, assign: &ExprAssign, src_loc: &SourceLocationSpan) -> Result<Operand, Error> {
        let target_loc = src_loc.at(&assign.target.span);
        let Some(path) = assign.target.as_path() else {
            return Err(errwithloc!(target_loc, "cannot assign to this expression"));
        };

        let value = self.interpret_expr(&assign.value, src_loc)?;
        let value = match assign.op {
            AssignOp::Set => value,
            AssignOp::Add | AssignOp::Sub => {
                let op = match assign.op {
                    AssignOp::Sub => BinaryOp::Sub,
                    _ => BinaryOp::Add,
                };
                let current = self.read_path(&path, &target_loc)?;
                Self::binary(op, current, value, &target_loc)?
            }
        };

        self.assign(&path, value, &src_loc.at(&assign.value.span))
    }

    fn assign(&mut self, path: &[&str], value: Operand, src_loc: &SourceLocationSpan) -> Result<Operand, Error> {
        if self.add_object_member(path, &value, src_loc)? {
            return Ok(value);
        }

        let target = self.resolve_mut(path, src_loc)?;
        let converted = Self::convert(&target.ty, value, src_loc)?;
        target.value = converted.clone();
        Ok(Operand::new(target.ty.as_str(), converted))
    }

    fn read_path(&self, path: &[&str], src_loc: &SourceLocationSpan) -> Result<Operand, Error> {
        let Some((root, rest)) = path.split_first() else {
            return Err(errwithloc!(src_loc, "empty name"));
        };
        if Value::default_for(root).is_some() {
            return Err(errwithloc!(src_loc, "'{}' is a type, not a value", root));
        }

        let mut entry = self
            .scopes()
            .into_iter()
            .find_map(|scope| scope.get(root))
            .ok_or_else(|| errwithloc!(src_loc, "cannot find '{}'", root))?;

        let mut walked = root.to_string();
        let mut rest = rest.iter();
        let mut instance = loop {
            match entry {
                Entry::Instance(instance) => break instance,
                Entry::Scope(scope) => {
                    let Some(segment) = rest.next() else {
                        return Err(errwithloc!(src_loc, "'{}' is a scope, not a value", walked));
                    };
                    entry = scope
                        .get(segment)
                        .ok_or_else(|| errwithloc!(src_loc, "'{}' is not a member of '{}'", segment, walked))?;
                    walked = format!("{}.{}", walked, segment);
                }
                Entry::Type(_) => return Err(errwithloc!(src_loc, "'{}' is a type, not a value", walked)),
            }
        };

        for segment in rest {
            instance = match &instance.value {
                Value::Object(members) => members
                    .get(*segment)
                    .ok_or_else(|| errwithloc!(src_loc, "'{}' is not a member of '{}'", segment, walked))?,
                _ => {
                    return Err(errwithloc!(
                        src_loc,
                        "'{}' of type '{}' has no members",
                        walked,
                        instance.ty
                    ))
                }
            };
            walked = format!("{}.{}", walked, segment);
        }

        Ok(Operand::new(instance.ty.as_str(), instance.value.clone()))
    }

    fn resolve_mut(&mut self, path: &[&str], src_loc: &SourceLocationSpan) -> Result<&mut Instance, Error> {
        let Some((root, rest)) = path.split_first() else {
            return Err(errwithloc!(src_loc, "empty name"));
        };
        if Value::default_for(root).is_some() {
            return Err(errwithloc!(src_loc, "'{}' is a type, not a value", root));
        }

        let entry = match &mut self.class {
            Some(class) if class.members.get(root).is_some() => class.members.get_mut(root),
            _ => (0..=self.open.len())
                .rev()
                .find(|&depth| {
                    scope_at(&self.global, &self.open[..depth]).map_or(false, |scope| scope.get(root).is_some())
                })
                .and_then(|depth| scope_at_mut(&mut self.global, &self.open[..depth]))
                .and_then(|scope| scope.get_mut(root)),
        };
        let mut entry = entry.ok_or_else(|| errwithloc!(src_loc, "cannot find '{}'", root))?;

        let mut walked = root.to_string();
        let mut rest = rest.iter();
        let mut instance = loop {
            match entry {
                Entry::Instance(instance) => break instance,
                Entry::Scope(scope) => {
                    let Some(segment) = rest.next() else {
                        return Err(errwithloc!(src_loc, "cannot assign to scope '{}'", walked));
                    };
                    entry = scope
                        .get_mut(segment)
                        .ok_or_else(|| errwithloc!(src_loc, "'{}' is not a member of '{}'", segment, walked))?;
                    walked = format!("{}.{}", walked, segment);
                }
                Entry::Type(_) => return Err(errwithloc!(src_loc, "cannot assign to class '{}'", walked)),
            }
        };

        for segment in rest {
            let ty = instance.ty.clone();
            instance = match &mut instance.value {
                Value::Object(members) => members
                    .get_mut(*segment)
                    .ok_or_else(|| errwithloc!(src_loc, "'{}' is not a member of '{}'", segment, walked))?,
                _ => return Err(errwithloc!(src_loc, "'{}' of type '{}' has no members", walked, ty)),
            };
            walked = format!("{}.{}", walked, segment);
        }

        Ok(instance)
    }

    // A plain `object` takes new members on assignment. Class instances keep their member set.
    fn add_object_member(
        &mut self,
        path: &[&str],
        value: &Operand,
        src_loc: &SourceLocationSpan,
    ) -> Result<bool, Error> {
        let Some((member, parent)) = path.split_last() else {
            return Ok(false);
        };
        if parent.is_empty() {
            return Ok(false);
        }
        match self.read_path(parent, src_loc) {
            Ok(Operand {
                ty,
                value: Value::Object(members),
            }) if ty == TYPE_OBJECT && !members.contains_key(*member) => {}
            _ => return Ok(false),
        }

        if let Value::Object(members) = &mut self.resolve_mut(parent, src_loc)?.value {
            let instance = Instance::new(*member, value.ty.as_str(), value.value.clone());
            members.insert(member.to_string(), instance);
        }
        Ok(true)
    }

    fn member_of(object: Operand, member: &str, src_loc: &SourceLocationSpan) -> Result<Operand, Error> {
        match object.value {
            Value::Object(mut members) => match members.remove(member) {
                Some(instance) => Ok(Operand::new(instance.ty, instance.value)),
                None => Err(errwithloc!(
                    src_loc,
                    "'{}' is not a member of type '{}'",
                    member,
                    object.ty
                )),
            },
            _ => Err(errwithloc!(src_loc, "type '{}' has no members", object.ty)),
        }
    }

    fn negate(operand: Operand, src_loc: &SourceLocationSpan) -> Result<Operand, Error> {
        let value = match operand.value {
            Value::Int(value) => Value::Int(
                value
                    .checked_neg()
                    .ok_or_else(|| errwithloc!(src_loc, "integer overflow in '-'"))?,
            ),
            Value::Float(value) => Value::Float(-value),
            _ => return Err(errwithloc!(src_loc, "operator '-' is not defined for '{}'", operand.ty)),
        };
        Ok(Operand::native(value))
    }

    fn binary(op: BinaryOp, left: Operand, right: Operand, src_loc: &SourceLocationSpan) -> Result<Operand, Error> {
        let value = match (&left.value, &right.value) {
            (Value::Int(l), Value::Int(r)) => {
                let result = match op {
                    BinaryOp::Add => l.checked_add(*r),
                    BinaryOp::Sub => l.checked_sub(*r),
                    BinaryOp::Mul => l.checked_mul(*r),
                    BinaryOp::Div => {
                        if *r == 0 {
                            return Err(errwithloc!(src_loc, "division by zero"));
                        }
                        l.checked_div(*r)
                    }
                };
                Value::Int(result.ok_or_else(|| errwithloc!(src_loc, "integer overflow in '{}'", op))?)
            }
            (Value::Int(l), Value::Float(r)) => Self::float_op(op, *l as f64, *r, src_loc)?,
            (Value::Float(l), Value::Int(r)) => Self::float_op(op, *l, *r as f64, src_loc)?,
            (Value::Float(l), Value::Float(r)) => Self::float_op(op, *l, *r, src_loc)?,
            (Value::String(l), Value::String(r)) if op == BinaryOp::Add => Value::String(format!("{}{}", l, r)),
            _ => {
                return Err(errwithloc!(
                    src_loc,
                    "operator '{}' is not defined for '{}' and '{}'",
                    op,
                    left.ty,
                    right.ty
                ))
            }
        };
        Ok(Operand::native(value))
    }

    fn float_op(op: BinaryOp, l: f64, r: f64, src_loc: &SourceLocationSpan) -> Result<Value, Error> {
        let result = match op {
            BinaryOp::Add => l + r,
            BinaryOp::Sub => l - r,
            BinaryOp::Mul => l * r,
            BinaryOp::Div => {
                if r == 0.0 {
                    return Err(errwithloc!(src_loc, "division by zero"));
                }
                l / r
            }
        };
        if !result.is_finite() {
            return Err(errwithloc!(src_loc, "float overflow in '{}'", op));
        }
        Ok(Value::Float(result))
    }

    /// Converts an assigned value to the declared type of its target.
    fn convert(target_ty: &str, operand: Operand, src_loc: &SourceLocationSpan) -> Result<Value, Error> {
        match (target_ty, operand.value) {
            (TYPE_INT, value @ Value::Int(_)) => Ok(value),
            (TYPE_FLOAT, value @ Value::Float(_)) => Ok(value),
            (TYPE_FLOAT, Value::Int(value)) => Ok(Value::Float(value as f64)),
            (TYPE_STRING, value @ Value::String(_)) => Ok(value),
            // Any object can be stored in a plain `object`; class instances need the same class.
            (TYPE_OBJECT, value @ Value::Object(_)) => Ok(value),
            (ty, value @ Value::Object(_)) if ty == operand.ty => Ok(value),
            _ => Err(errwithloc!(src_loc, "cannot assign '{}' to '{}'", operand.ty, target_ty)),
        }
    }

    fn check_new_name(&self, name: &str, src_loc: &SourceLocationSpan) -> Result<(), Error> {
        Self::check_not_intrinsic(name, src_loc)?;
        if self.current_scope().and_then(|scope| scope.get(name)).is_some() {
            return Err(errwithloc!(src_loc, "'{}' is already declared in this scope", name));
        }
        Ok(())
    }

    fn check_not_intrinsic(name: &str, src_loc: &SourceLocationSpan) -> Result<(), Error> {
        if Value::default_for(name).is_some() {
            return Err(errwithloc!(src_loc, "'{}' is a built-in type name", name));
        }
        Ok(())
    }

    fn current_scope(&self) -> Option<&Scope> {
        match &self.class {
            Some(class) => Some(&class.members),
            None => scope_at(&self.global, &self.open),
        }
    }

    fn current_scope_mut(&mut self) -> Result<&mut Scope, Error> {
        match &mut self.class {
            Some(class) => Ok(&mut class.members),
            None => scope_at_mut(&mut self.global, &self.open).ok_or_else(|| anyhow!("open scope is missing")),
        }
    }

    // Innermost first, ending with the global scope.
    fn scopes(&self) -> Vec<&Scope> {
        let class = self.class.iter().map(|class| &class.members);
        let blocks = (0..=self.open.len())
            .rev()
            .filter_map(|depth| scope_at(&self.global, &self.open[..depth]));
        class.chain(blocks).collect()
    }
}

fn scope_at<'s>(global: &'s Scope, open: &[OpenScope]) -> Option<&'s Scope> {
    open.iter().try_fold(global, |scope, block| scope.get_scope(&block.name))
}

fn scope_at_mut<'s>(global: &'s mut Scope, open: &[OpenScope]) -> Option<&'s mut Scope> {
    open.iter().try_fold(global, |scope, block| scope.get_scope_mut(&block.name))
}

impl Operand {
    fn new(ty: impl Into<String>, value: Value) -> Operand {
        Operand { ty: ty.into(), value }
    }

    fn native(value: Value) -> Operand {
        let ty = match &value {
            Value::String(_) => TYPE_STRING,
            Value::Int(_) => TYPE_INT,
            Value::Float(_) => TYPE_FLOAT,
            Value::Object(_) => TYPE_OBJECT,
        };
        Operand::new(ty, value)
    }
}
