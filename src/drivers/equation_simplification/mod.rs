//! Driver for the derivation of simplified working equations in QWick.

use std::fmt;

use anyhow::{self, format_err};
use derive_builder::Builder;
use log;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

use crate::context::WickContext;
use crate::drivers::QWickDriver;
use crate::expression::Expr;
use crate::io::format::{
    log_subtitle, log_title, nice_bool, qwick_output, qwick_warn, QWickOutput,
};
use crate::io::{write_qwick_binary, QWickFileType};


// ==================
// Struct definitions
// ==================

// ----------
// Parameters
// ----------

fn default_n_threads() -> usize {
    1
}

/// Structure containing control parameters for equation simplification.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct EquationSimplificationParams {
    /// The largest number of uncontracted operators kept in a term after normal ordering. If
    /// `None`, every term of the normal-ordered expansion is kept. A value of `0` keeps only
    /// fully contracted terms, as for vacuum expectation values.
    #[builder(default = "None")]
    #[serde(default)]
    pub max_unctr: Option<usize>,

    /// Boolean indicating if operators are only brought into normal order without contraction.
    #[builder(default = "false")]
    #[serde(default)]
    pub no_ctr: bool,

    /// The number of threads used for normal ordering and term merging.
    #[builder(default = "1")]
    #[serde(default = "default_n_threads")]
    pub n_threads: usize,

    /// Boolean indicating if terms with operators acting on external indices are dropped after
    /// normal ordering.
    #[builder(default = "false")]
    #[serde(default)]
    pub remove_external: bool,

    /// Boolean indicating if spin-free operators are given the exchange symmetry of their
    /// creation and annihilation halves before simplification, as for the reduced density
    /// matrices they are eventually replaced by.
    #[builder(default = "false")]
    #[serde(default)]
    pub spin_free_trans_symm: bool,

    /// Optional name for saving the simplified expression as a binary file of type
    /// [`QWickFileType::Expr`]. If `None`, the result will not be saved.
    #[builder(default = "None")]
    #[serde(default)]
    pub result_save_name: Option<String>,
}

impl EquationSimplificationParams {
    /// Returns a builder to construct a [`EquationSimplificationParams`] structure.
    pub fn builder() -> EquationSimplificationParamsBuilder {
        EquationSimplificationParamsBuilder::default()
    }
}

impl Default for EquationSimplificationParams {
    fn default() -> Self {
        Self::builder()
            .build()
            .expect("Unable to construct a default `EquationSimplificationParams`.")
    }
}

impl fmt::Display for EquationSimplificationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Maximum uncontracted operators: {}",
            self.max_unctr
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unlimited".to_string())
        )?;
        writeln!(f, "Reorder without contraction: {}", nice_bool(self.no_ctr))?;
        writeln!(f, "Number of threads: {}", self.n_threads)?;
        writeln!(
            f,
            "Remove external operators: {}",
            nice_bool(self.remove_external)
        )?;
        writeln!(
            f,
            "Spin-free transposition symmetry: {}",
            nice_bool(self.spin_free_trans_symm)
        )?;
        writeln!(
            f,
            "Save simplified expression to file: {}",
            if let Some(name) = self.result_save_name.as_ref() {
                format!("{name}.{}", QWickFileType::Expr.ext())
            } else {
                nice_bool(false)
            }
        )?;
        writeln!(f)?;

        Ok(())
    }
}

// ------
// Result
// ------

/// Structure to contain equation simplification results.
#[derive(Clone, Builder, Debug)]
pub struct EquationSimplificationResult<'a> {
    /// The control parameters used to obtain this result.
    parameters: &'a EquationSimplificationParams,

    /// The number of terms after definitions have been substituted.
    pub n_substituted: usize,

    /// The number of terms after normal ordering.
    pub n_expanded: usize,

    /// The simplified expression.
    pub expression: Expr,
}

impl<'a> EquationSimplificationResult<'a> {
    fn builder() -> EquationSimplificationResultBuilder<'a> {
        EquationSimplificationResultBuilder::default()
    }

    /// Returns the control parameters used to obtain this result.
    pub fn parameters(&self) -> &EquationSimplificationParams {
        self.parameters
    }
}

impl fmt::Display for EquationSimplificationResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Terms after substitution: {}", self.n_substituted)?;
        writeln!(f, "Terms after normal ordering: {}", self.n_expanded)?;
        writeln!(f, "Terms after simplification: {}", self.expression.len())?;
        writeln!(f)?;
        writeln!(f, "{}", self.expression)?;
        Ok(())
    }
}

// ------
// Driver
// ------

/// Driver for the derivation of a simplified equation.
///
/// The equation is parsed in a [`WickContext`], its defined tensors are substituted, and the
/// result is normal-ordered and simplified.
#[derive(Clone, Builder)]
pub struct EquationSimplificationDriver<'a> {
    /// The control parameters for equation simplification.
    parameters: &'a EquationSimplificationParams,

    /// The context in which the equation is read.
    context: &'a WickContext,

    /// The expression literal of the equation.
    #[builder(setter(into))]
    equation: String,

    /// The result of the simplification.
    #[builder(setter(skip), default = "None")]
    result: Option<EquationSimplificationResult<'a>>,
}

impl<'a> EquationSimplificationDriver<'a> {
    /// Returns a builder to construct a [`EquationSimplificationDriver`] structure.
    pub fn builder() -> EquationSimplificationDriverBuilder<'a> {
        EquationSimplificationDriverBuilder::default()
    }

    /// Executes equation simplification.
    fn simplify_equation(&mut self) -> Result<(), anyhow::Error> {
        log_title("Equation Simplification");
        qwick_output!("");
        let params = self.parameters;
        params.log_output_display();

        let pool = ThreadPoolBuilder::new()
            .num_threads(params.n_threads.max(1))
            .build()
            .map_err(|err| format_err!(err))?;

        let expr = self.context.parse_expr(&self.equation)?;
        let substituted = expr.substitute(self.context.definitions());
        log::debug!(
            "Substitution turned {} term(s) into {} term(s).",
            expr.len(),
            substituted.len()
        );

        let mut expanded = substituted.expand_in(&pool, params.max_unctr, params.no_ctr);
        let n_expanded = expanded.len();
        if params.remove_external {
            expanded = expanded.remove_external();
            log::debug!(
                "{} term(s) left after removing external operators.",
                expanded.len()
            );
        }
        if params.spin_free_trans_symm {
            expanded = expanded.add_spin_free_trans_symm();
        }
        let simplified = expanded.simplify_in(&pool);
        if simplified.is_empty() {
            qwick_warn!("The simplified equation has no terms.");
        }

        let result = EquationSimplificationResult::builder()
            .parameters(params)
            .n_substituted(substituted.len())
            .n_expanded(n_expanded)
            .expression(simplified)
            .build()?;

        log_subtitle("Simplified equation");
        qwick_output!("");
        result.log_output_display();

        if let Some(name) = params.result_save_name.as_ref() {
            write_qwick_binary(name, QWickFileType::Expr, &result.expression)?;
            qwick_output!(
                "Simplified expression saved as {name}.{}.",
                QWickFileType::Expr.ext()
            );
            qwick_output!("");
        }

        self.result = Some(result);
        Ok(())
    }
}

impl<'a> QWickDriver for EquationSimplificationDriver<'a> {
    type Params = EquationSimplificationParams;

    type Outcome = EquationSimplificationResult<'a>;

    fn result(&self) -> Result<&Self::Outcome, anyhow::Error> {
        self.result
            .as_ref()
            .ok_or_else(|| format_err!("No equation simplification results found."))
    }

    fn run(&mut self) -> Result<(), anyhow::Error> {
        self.simplify_equation()
    }
}
