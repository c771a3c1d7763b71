//! YAML input specifications for QWick calculations.

use anyhow::{self, ensure};
use serde::{Deserialize, Serialize};

use crate::context::{WickContext, WickContextSpec};
use crate::drivers::equation_simplification::{
    EquationSimplificationDriver, EquationSimplificationParams,
};
use crate::drivers::QWickDriver;
use crate::interfaces::InputHandle;
use crate::io::format::{log_subtitle, qwick_output};


/// A named equation to be simplified.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EquationInput {
    /// The name of the equation, used in the output.
    pub name: String,

    /// The expression literal of the equation, one term per line.
    pub equation: String,

    /// Parameters for this equation only. If `None`, the parameters of the input are used.
    ///
    /// If not specified, this will be taken to be `None`.
    #[serde(default)]
    pub parameters: Option<EquationSimplificationParams>,

    /// Optional tensor literal, such as `r[ia]`, into which the simplified equation is written as
    /// `numpy.einsum` statements. If `None`, no code is generated.
    ///
    /// If not specified, this will be taken to be `None`.
    #[serde(default)]
    pub einsum_target: Option<String>,
}

/// A structure containing `QWick` input parameters which can be serialised into and deserialised
/// from a YAML input file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Input {
    /// Specification of the index spaces, tensor symmetries and definitions shared by all
    /// equations.
    #[serde(default)]
    pub context: WickContextSpec,

    /// Default parameters for equation simplification. The name of a
    /// [`crate::io::QWickFileType::Expr`] file given here is suffixed by the name of each equation.
    ///
    /// If not specified, the default parameters are used.
    #[serde(default)]
    pub parameters: EquationSimplificationParams,

    /// The equations to be simplified, in order.
    #[serde(default)]
    pub equations: Vec<EquationInput>,
}

impl InputHandle for Input {
    /// Simplifies every equation of the input in a common context.
    fn handle(&self) -> Result<(), anyhow::Error> {
        let ctx = WickContext::from_spec(&self.context)?;
        for (i, eq) in self.equations.iter().enumerate() {
            ensure!(
                self.equations[..i].iter().all(|prev| prev.name != eq.name),
                "Equation `{}` is specified more than once.",
                eq.name
            );
        }

        for eq in self.equations.iter() {
            log_subtitle(&format!("Equation `{}`", eq.name));
            qwick_output!("");
            let params = match eq.parameters.as_ref() {
                Some(params) => params.clone(),
                None => {
                    let mut params = self.parameters.clone();
                    params.result_save_name = params
                        .result_save_name
                        .map(|prefix| format!("{prefix}_{}", eq.name));
                    params
                }
            };
            let mut driver = EquationSimplificationDriver::builder()
                .parameters(&params)
                .context(&ctx)
                .equation(eq.equation.as_str())
                .build()?;
            driver.run()?;

            if let Some(target) = eq.einsum_target.as_ref() {
                let target = ctx.parse_tensor(target)?;
                let code = driver.result()?.expression.to_einsum(&target);
                qwick_output!("Contractions into `{target}`:");
                code.lines().for_each(|line| {
                    qwick_output!("  {line}");
                });
                qwick_output!("");
            }
        }
        Ok(())
    }
}
