//! SQL validation logic.
//!
//! Uses sqlparser-rs with the SQLite dialect to parse candidates and check
//! them structurally, on top of raw-text checks for chained statements and
//! denylisted verbs. Structural checking closes bypass routes that pure
//! keyword scanning misses, such as mutations hidden inside derived tables.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use sqlparser::ast::{
    Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, Join, JoinConstraint,
    JoinOperator, Query, Select, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins,
};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::profile::SchemaSummary;

use super::{RejectionReason, SqlCandidate};

/// Statement verbs that are never allowed, matched on word boundaries
/// anywhere in the raw text (comments included).
const DENIED_VERBS: &str =
    r"(?i)\b(insert|update|delete|drop|alter|create|truncate|attach|pragma|replace)\b";

fn denied_verb_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(DENIED_VERBS).expect("denylist pattern is valid"))
}

/// Validates model-generated SQL candidates against the loaded dataset.
///
/// Acceptance requires a single SELECT statement, free of mutating
/// constructs, that references only the dataset table and its columns.
/// Validation is deterministic and has no side effects; rejected candidates
/// are never repaired.
#[derive(Debug)]
pub struct SqlValidator {
    dialect: SQLiteDialect,
    schema: SchemaSummary,
    table_name: String,
}

impl SqlValidator {
    /// Creates a validator for the given schema and projected table name.
    pub fn new(schema: SchemaSummary, table_name: impl Into<String>) -> Self {
        Self {
            dialect: SQLiteDialect {},
            schema,
            table_name: table_name.into(),
        }
    }

    /// Validates a candidate, returning it with `validated` and
    /// `rejection_reason` filled in.
    pub fn validate(&self, candidate: SqlCandidate) -> SqlCandidate {
        match self.check(&candidate.raw_text) {
            Ok(()) => candidate.accept(),
            Err(reason) => {
                debug!(reason = %reason, "rejected SQL candidate");
                candidate.reject(reason)
            }
        }
    }

    fn check(&self, raw_text: &str) -> Result<(), RejectionReason> {
        let trimmed = raw_text.trim();
        if trimmed.is_empty() {
            return Err(RejectionReason::Malformed);
        }

        if !starts_with_select(trimmed) {
            return Err(RejectionReason::UnsafeVerb);
        }

        if has_chained_statement(trimmed) {
            return Err(RejectionReason::MultiStatement);
        }

        if denied_verb_pattern().is_match(trimmed) {
            return Err(RejectionReason::UnsafeVerb);
        }

        let statements = Parser::parse_sql(&self.dialect, trimmed)
            .map_err(|_| RejectionReason::Malformed)?;

        match statements.len() {
            0 => return Err(RejectionReason::Malformed),
            1 => {}
            _ => return Err(RejectionReason::MultiStatement),
        }

        let query = match &statements[0] {
            Statement::Query(query) => query,
            _ => return Err(RejectionReason::UnsafeVerb),
        };

        let mut scope = Scope::new(&self.schema, &self.table_name);
        check_query(query, &mut scope)
    }
}

fn starts_with_select(trimmed: &str) -> bool {
    trimmed
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("select"))
}

/// Detects a semicolon followed by further non-whitespace content.
fn has_chained_statement(trimmed: &str) -> bool {
    match trimmed.find(';') {
        Some(idx) => !trimmed[idx + 1..].trim().is_empty(),
        None => false,
    }
}

/// Identifier scope for a candidate statement.
///
/// Tracks which relation and column names a reference may resolve to: the
/// dataset table and its columns, plus aliases the statement itself
/// introduces. A single flat scope is enough for the query shapes the
/// generation prompt asks for.
struct Scope<'a> {
    schema: &'a SchemaSummary,
    /// Lowercased relation names: the dataset table plus introduced aliases.
    relations: HashSet<String>,
    /// Lowercased column aliases introduced by the statement.
    column_aliases: HashSet<String>,
}

impl<'a> Scope<'a> {
    fn new(schema: &'a SchemaSummary, table_name: &str) -> Self {
        let mut relations = HashSet::new();
        relations.insert(table_name.to_lowercase());
        Self {
            schema,
            relations,
            column_aliases: HashSet::new(),
        }
    }

    fn add_relation(&mut self, name: &str) {
        self.relations.insert(name.to_lowercase());
    }

    fn add_column_alias(&mut self, name: &str) {
        self.column_aliases.insert(name.to_lowercase());
    }

    fn knows_relation(&self, name: &str) -> bool {
        self.relations.contains(&name.to_lowercase())
    }

    fn knows_column(&self, name: &str) -> bool {
        self.schema.contains_column(name) || self.column_aliases.contains(&name.to_lowercase())
    }
}

/// Checks a Query: CTEs, body, ORDER BY, and LIMIT/OFFSET.
fn check_query(query: &Query, scope: &mut Scope<'_>) -> Result<(), RejectionReason> {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            check_query(&cte.query, scope)?;
            scope.add_relation(&cte.alias.name.value);
        }
    }

    check_set_expr(&query.body, scope)?;

    if let Some(order_by) = &query.order_by {
        for order_expr in &order_by.exprs {
            check_expr(&order_expr.expr, scope)?;
        }
    }

    if let Some(limit) = &query.limit {
        check_expr(limit, scope)?;
    }
    if let Some(offset) = &query.offset {
        check_expr(&offset.value, scope)?;
    }

    Ok(())
}

/// Checks a SetExpr, rejecting mutations and recursing into nested queries.
fn check_set_expr(set_expr: &SetExpr, scope: &mut Scope<'_>) -> Result<(), RejectionReason> {
    match set_expr {
        SetExpr::Select(select) => check_select(select, scope),
        SetExpr::Query(query) => check_query(query, scope),
        SetExpr::SetOperation { left, right, .. } => {
            check_set_expr(left, scope)?;
            check_set_expr(right, scope)
        }
        SetExpr::Values(_) => Ok(()),
        // Mutations wrapped as set expressions, and anything unrecognized
        _ => Err(RejectionReason::UnsafeVerb),
    }
}

/// Checks a Select: relations first so aliases are known, then projections
/// and filter expressions.
fn check_select(select: &Select, scope: &mut Scope<'_>) -> Result<(), RejectionReason> {
    for table_with_joins in &select.from {
        check_table_with_joins(table_with_joins, scope)?;
    }

    for item in &select.projection {
        if let SelectItem::ExprWithAlias { alias, .. } = item {
            scope.add_column_alias(&alias.value);
        }
    }

    for item in &select.projection {
        match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                check_expr(expr, scope)?;
            }
            SelectItem::QualifiedWildcard(name, _) => {
                check_relation_reference(name_parts(name), scope)?;
            }
            SelectItem::Wildcard(_) => {}
        }
    }

    if let Some(selection) = &select.selection {
        check_expr(selection, scope)?;
    }

    if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
        for expr in exprs {
            check_expr(expr, scope)?;
        }
    }

    if let Some(having) = &select.having {
        check_expr(having, scope)?;
    }

    Ok(())
}

/// Checks a TableWithJoins: the main relation, joined relations, and join
/// constraints.
fn check_table_with_joins(
    twj: &TableWithJoins,
    scope: &mut Scope<'_>,
) -> Result<(), RejectionReason> {
    check_table_factor(&twj.relation, scope)?;

    for join in &twj.joins {
        check_table_factor(&join.relation, scope)?;
    }
    for join in &twj.joins {
        check_join_constraint(join, scope)?;
    }

    Ok(())
}

/// Checks a TableFactor, registering aliases and recursing into derived
/// tables.
fn check_table_factor(factor: &TableFactor, scope: &mut Scope<'_>) -> Result<(), RejectionReason> {
    match factor {
        TableFactor::Table { name, alias, .. } => {
            check_relation_reference(name_parts(name), scope)?;
            if let Some(alias) = alias {
                scope.add_relation(&alias.name.value);
            }
            Ok(())
        }
        TableFactor::Derived {
            subquery, alias, ..
        } => {
            check_query(subquery, scope)?;
            if let Some(alias) = alias {
                scope.add_relation(&alias.name.value);
            }
            Ok(())
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => check_table_with_joins(table_with_joins, scope),
        _ => Err(RejectionReason::UnknownIdentifier),
    }
}

fn check_join_constraint(join: &Join, scope: &mut Scope<'_>) -> Result<(), RejectionReason> {
    let constraint = match &join.join_operator {
        JoinOperator::Inner(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c) => c,
        _ => return Ok(()),
    };

    match constraint {
        JoinConstraint::On(expr) => check_expr(expr, scope),
        JoinConstraint::Using(columns) => {
            for column in columns {
                if !scope.knows_column(&column.value) {
                    return Err(RejectionReason::UnknownIdentifier);
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Checks an expression tree, resolving every identifier it references.
///
/// Unrecognized expression forms without identifiers pass through; anything
/// that names a column or relation is resolved against the scope.
fn check_expr(expr: &Expr, scope: &mut Scope<'_>) -> Result<(), RejectionReason> {
    match expr {
        Expr::Identifier(ident) => {
            if scope.knows_column(&ident.value) {
                Ok(())
            } else {
                Err(RejectionReason::UnknownIdentifier)
            }
        }
        Expr::CompoundIdentifier(parts) => check_compound_identifier(parts, scope),
        Expr::BinaryOp { left, right, .. } => {
            check_expr(left, scope)?;
            check_expr(right, scope)
        }
        Expr::UnaryOp { expr, .. } | Expr::Nested(expr) => check_expr(expr, scope),
        Expr::IsNull(expr)
        | Expr::IsNotNull(expr)
        | Expr::IsTrue(expr)
        | Expr::IsNotTrue(expr)
        | Expr::IsFalse(expr)
        | Expr::IsNotFalse(expr) => check_expr(expr, scope),
        Expr::Between {
            expr, low, high, ..
        } => {
            check_expr(expr, scope)?;
            check_expr(low, scope)?;
            check_expr(high, scope)
        }
        Expr::InList { expr, list, .. } => {
            check_expr(expr, scope)?;
            for item in list {
                check_expr(item, scope)?;
            }
            Ok(())
        }
        Expr::InSubquery { expr, subquery, .. } => {
            check_expr(expr, scope)?;
            check_query(subquery, scope)
        }
        Expr::Like { expr, pattern, .. }
        | Expr::ILike { expr, pattern, .. }
        | Expr::SimilarTo { expr, pattern, .. } => {
            check_expr(expr, scope)?;
            check_expr(pattern, scope)
        }
        Expr::Cast { expr, .. } => check_expr(expr, scope),
        Expr::Extract { expr, .. } => check_expr(expr, scope),
        Expr::Substring {
            expr,
            substring_from,
            substring_for,
            ..
        } => {
            check_expr(expr, scope)?;
            if let Some(from) = substring_from {
                check_expr(from, scope)?;
            }
            if let Some(length) = substring_for {
                check_expr(length, scope)?;
            }
            Ok(())
        }
        Expr::Case {
            operand,
            conditions,
            results,
            else_result,
            ..
        } => {
            if let Some(operand) = operand {
                check_expr(operand, scope)?;
            }
            for condition in conditions {
                check_expr(condition, scope)?;
            }
            for result in results {
                check_expr(result, scope)?;
            }
            if let Some(else_result) = else_result {
                check_expr(else_result, scope)?;
            }
            Ok(())
        }
        Expr::Function(function) => {
            match &function.args {
                FunctionArguments::List(list) => {
                    for arg in &list.args {
                        check_function_arg(arg, scope)?;
                    }
                }
                FunctionArguments::Subquery(query) => check_query(query, scope)?,
                FunctionArguments::None => {}
            }
            Ok(())
        }
        Expr::Exists { subquery, .. } | Expr::Subquery(subquery) => check_query(subquery, scope),
        Expr::Tuple(exprs) => {
            for expr in exprs {
                check_expr(expr, scope)?;
            }
            Ok(())
        }
        // Literals and any remaining identifier-free forms
        _ => Ok(()),
    }
}

fn check_function_arg(arg: &FunctionArg, scope: &mut Scope<'_>) -> Result<(), RejectionReason> {
    let arg_expr = match arg {
        FunctionArg::Named { arg, .. } => arg,
        FunctionArg::Unnamed(arg) => arg,
    };
    match arg_expr {
        FunctionArgExpr::Expr(expr) => check_expr(expr, scope),
        FunctionArgExpr::QualifiedWildcard(name) => {
            check_relation_reference(name_parts(name), scope)
        }
        FunctionArgExpr::Wildcard => Ok(()),
    }
}

/// Checks a `t.column` style reference: the qualifier must be a known
/// relation and the final part a known column.
fn check_compound_identifier(
    parts: &[sqlparser::ast::Ident],
    scope: &Scope<'_>,
) -> Result<(), RejectionReason> {
    let (column, qualifier) = match parts.split_last() {
        Some(split) => split,
        None => return Err(RejectionReason::Malformed),
    };

    for part in qualifier {
        if !scope.knows_relation(&part.value) {
            return Err(RejectionReason::UnknownIdentifier);
        }
    }

    if scope.knows_column(&column.value) {
        Ok(())
    } else {
        Err(RejectionReason::UnknownIdentifier)
    }
}

fn check_relation_reference(
    parts: &[sqlparser::ast::Ident],
    scope: &Scope<'_>,
) -> Result<(), RejectionReason> {
    let name = match parts.last() {
        Some(ident) => &ident.value,
        None => return Err(RejectionReason::Malformed),
    };

    if scope.knows_relation(name) {
        Ok(())
    } else {
        Err(RejectionReason::UnknownIdentifier)
    }
}

fn name_parts(name: &sqlparser::ast::ObjectName) -> &[sqlparser::ast::Ident] {
    &name.0
}
