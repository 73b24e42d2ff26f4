//! Composable SELECT statements.
//!
//! Queries are assembled from column references, literals, arithmetic and
//! aggregate calls, then rendered to SQLite SQL:
//!
//! ```
//! use salary_ledger::ledger::query::{SelectQuery, col, lit};
//!
//! let monthly = col("SALARY") / lit(12.0);
//! let sql = SelectQuery::from_table("salaries")
//!     .select(col("DESIGNATION").alias("designation"))
//!     .select(monthly.clone().avg().alias("avg_monthly_salary"))
//!     .group_by(col("DESIGNATION"))
//!     .order_by(monthly.avg().desc())
//!     .to_sql();
//!
//! assert_eq!(
//!     sql,
//!     "SELECT \"DESIGNATION\" AS \"designation\", AVG(\"SALARY\" / 12.0) AS \"avg_monthly_salary\" \
//!      FROM \"salaries\" GROUP BY \"DESIGNATION\" ORDER BY AVG(\"SALARY\" / 12.0) DESC"
//! );
//! ```

use super::schema::quote_ident;
use std::fmt::{self, Write as _};
use std::ops;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Min,
    Max,
    Avg,
    Sum,
    Count,
}

impl AggregateFn {
    fn name(self) -> &'static str {
        match self {
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Avg => "AVG",
            Self::Sum => "SUM",
            Self::Count => "COUNT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Float(f64),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Aggregate {
        func: AggregateFn,
        arg: Box<Expr>,
    },
}

pub fn col(name: &str) -> Expr {
    Expr::Column(name.to_owned())
}

pub fn lit(value: f64) -> Expr {
    Expr::Float(value)
}

impl Expr {
    fn binary(self, op: BinaryOp, rhs: Self) -> Self {
        Self::Binary {
            op,
            left: Box::new(self),
            right: Box::new(rhs),
        }
    }

    fn aggregate(self, func: AggregateFn) -> Self {
        Self::Aggregate {
            func,
            arg: Box::new(self),
        }
    }

    pub fn min(self) -> Self {
        self.aggregate(AggregateFn::Min)
    }

    pub fn max(self) -> Self {
        self.aggregate(AggregateFn::Max)
    }

    pub fn avg(self) -> Self {
        self.aggregate(AggregateFn::Avg)
    }

    pub fn sum(self) -> Self {
        self.aggregate(AggregateFn::Sum)
    }

    pub fn count(self) -> Self {
        self.aggregate(AggregateFn::Count)
    }

    pub fn alias(self, name: &str) -> SelectItem {
        SelectItem {
            expr: self,
            alias: Some(name.to_owned()),
        }
    }

    pub fn asc(self) -> OrderTerm {
        OrderTerm {
            expr: self,
            descending: false,
        }
    }

    pub fn desc(self) -> OrderTerm {
        OrderTerm {
            expr: self,
            descending: true,
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Self::Column(name) => out.push_str(&quote_ident(name)),
            // Debug keeps the decimal point, so SQLite never sees an integer literal
            Self::Float(v) => {
                let _ = write!(out, "{v:?}");
            }
            Self::Binary { op, left, right } => {
                render_operand(left, out);
                let _ = write!(out, " {} ", op.symbol());
                render_operand(right, out);
            }
            Self::Aggregate { func, arg } => {
                out.push_str(func.name());
                out.push('(');
                arg.render(out);
                out.push(')');
            }
        }
    }
}

fn render_operand(expr: &Expr, out: &mut String) {
    if matches!(expr, Expr::Binary { .. }) {
        out.push('(');
        expr.render(out);
        out.push(')');
    } else {
        expr.render(out);
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut out);
        f.write_str(&out)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl ops::$trait for Expr {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self {
                self.binary($op, rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Sub);
impl_binary_op!(Mul, mul, BinaryOp::Mul);
impl_binary_op!(Div, div, BinaryOp::Div);

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl From<Expr> for SelectItem {
    fn from(expr: Expr) -> Self {
        Self { expr, alias: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub expr: Expr,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    table: String,
    items: Vec<SelectItem>,
    group_by: Vec<Expr>,
    order_by: Vec<OrderTerm>,
}

impl SelectQuery {
    pub fn from_table(table: &str) -> Self {
        Self {
            table: table.to_owned(),
            items: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
        }
    }

    pub fn select(mut self, item: impl Into<SelectItem>) -> Self {
        self.items.push(item.into());
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn order_by(mut self, term: OrderTerm) -> Self {
        self.order_by.push(term);
        self
    }

    pub fn to_sql(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.items.is_empty() {
            sql.push('*');
        }
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            item.expr.render(&mut sql);
            if let Some(alias) = &item.alias {
                sql.push_str(" AS ");
                sql.push_str(&quote_ident(alias));
            }
        }

        sql.push_str(" FROM ");
        sql.push_str(&quote_ident(&self.table));

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            let keys: Vec<String> = self.group_by.iter().map(Expr::to_string).collect();
            sql.push_str(&keys.join(", "));
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|t| {
                    let dir = if t.descending { "DESC" } else { "ASC" };
                    format!("{} {dir}", t.expr)
                })
                .collect();
            sql.push_str(&terms.join(", "));
        }
        sql
    }
}
