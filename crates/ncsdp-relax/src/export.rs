//! Solver-facing views of a built relaxation.
//!
//! The SDP handed to a solver is
//! `min obj·y  s.t.  Σ_k y_k F_k - F_0 ⪰ 0` in block-diagonal form, with
//! `F_k` column `k` of the (lifted) constraint structure. The SDPA entry
//! stream lists the upper triangles of `F_0, F_1, …` in that order,
//! with `F_0` negated.

use std::fmt;

use num_complex::Complex64;

use ncsdp_linalg::{CsrMatrix, SparseRows};

use crate::assembler::BlockStructure;
use crate::index::VarId;

/// The real SDP after complex lifting.
#[derive(Clone, Debug, PartialEq)]
pub struct LiftedProblem {
    /// Signed block sizes.
    pub block_struct: BlockStructure,
    /// Real constraint structure, `n_vars + 1` columns.
    pub f: SparseRows<f64>,
    /// Objective coefficients of the variables.
    pub objective: Vec<f64>,
    /// Constant part of the objective.
    pub constant_term: f64,
}

impl LiftedProblem {
    /// Number of SDP variables.
    #[must_use]
    pub fn n_vars(&self) -> usize {
        self.objective.len()
    }

    /// Constraint structure by variable: row `k` of the result holds `F_k`.
    #[must_use]
    pub fn by_variable(&self) -> CsrMatrix<f64> {
        self.f.to_csr().transpose()
    }

    /// Sparse entries in SDPA order.
    #[must_use]
    pub fn sdpa_entries(&self) -> Vec<SdpaEntry> {
        let by_var = self.by_variable();
        let mut out = Vec::with_capacity(by_var.nnz());
        for var in 0..by_var.num_rows() {
            for (row, value) in by_var.row_iter(var) {
                let Some((block, i, j)) = self.block_struct.locate(row) else {
                    continue;
                };
                out.push(SdpaEntry {
                    var,
                    block: block + 1,
                    i: i + 1,
                    j: j + 1,
                    value: if var == 0 { -value } else { value },
                });
            }
        }
        out
    }

    /// Writes the problem in the SDPA sparse text format.
    #[must_use]
    pub fn to_sdpa(&self) -> String {
        self.to_string()
    }
}

/// The SDPA sparse text format.
impl fmt::Display for LiftedProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.n_vars())?;
        writeln!(f, "{}", self.block_struct.len())?;
        let sizes: Vec<String> = self.block_struct.sizes().iter().map(ToString::to_string).collect();
        writeln!(f, "{}", sizes.join(" "))?;
        let objective: Vec<String> = self.objective.iter().map(ToString::to_string).collect();
        writeln!(f, "{}", objective.join(" "))?;
        for e in self.sdpa_entries() {
            writeln!(f, "{} {} {} {} {}", e.var, e.block, e.i, e.j, e.value)?;
        }
        Ok(())
    }
}

/// One `(variable, block, i, j, value)` entry, 1-based in block and cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SdpaEntry {
    /// Variable, 0 for the constant matrix.
    pub var: VarId,
    /// Block, starting at 1.
    pub block: usize,
    /// Row, starting at 1.
    pub i: usize,
    /// Column, starting at 1.
    pub j: usize,
    /// Coefficient.
    pub value: f64,
}

/// The relaxation with every cell spelled out in terms of moments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HumanReadable {
    /// The objective.
    pub objective: String,
    /// One dense matrix of cell expressions per block; free blocks are
    /// listed as diagonal matrices.
    pub blocks: Vec<Vec<Vec<String>>>,
}

fn format_coeff(c: Complex64) -> String {
    if c.im == 0.0 {
        format!("{}", c.re)
    } else {
        format!("({}{:+}i)", c.re, c.im)
    }
}

/// Renders `Σ c_k · name_k` with `names[k - 1]` naming variable `k`.
fn format_terms(terms: impl IntoIterator<Item = (VarId, Complex64)>, names: &[String]) -> String {
    let one = Complex64::new(1.0, 0.0);
    let mut parts: Vec<String> = Vec::new();
    for (var, c) in terms {
        if c == Complex64::new(0.0, 0.0) {
            continue;
        }
        if var == 0 {
            parts.push(format_coeff(c));
            continue;
        }
        let name = names
            .get(var - 1)
            .map_or_else(|| format!("y{var}"), Clone::clone);
        if c == one {
            parts.push(name);
        } else if c == -one {
            parts.push(format!("-{name}"));
        } else {
            parts.push(format!("{}*{name}", format_coeff(c)));
        }
    }
    if parts.is_empty() {
        return "0".to_string();
    }
    parts.join(" + ").replace("+ -", "- ")
}

/// Spells out the objective and every block.
#[must_use]
pub fn human_readable(
    blocks: &BlockStructure,
    f: &SparseRows<Complex64>,
    objective: &[f64],
    constant_term: f64,
    names: &[String],
) -> HumanReadable {
    let objective_terms = std::iter::once((0, Complex64::new(constant_term, 0.0))).chain(
        objective
            .iter()
            .enumerate()
            .map(|(k, &c)| (k + 1, Complex64::new(c, 0.0))),
    );

    let mut rendered = Vec::with_capacity(blocks.len());
    for b in 0..blocks.len() {
        let n = blocks.width(b);
        let free = blocks.sizes()[b] < 0;
        let mut m = vec![vec!["0".to_string(); n]; n];
        for i in 0..n {
            let cols = if free { i..i + 1 } else { i..n };
            for j in cols {
                let cell = format_terms(f.row(blocks.cell_row(b, i, j)).iter().copied(), names);
                m[j][i].clone_from(&cell);
                m[i][j] = cell;
            }
        }
        rendered.push(m);
    }

    HumanReadable {
        objective: format_terms(objective_terms, names),
        blocks: rendered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem() -> LiftedProblem {
        // a 2 × 2 block and a free block of one constraint
        let blocks = BlockStructure::from_sizes(&[2, -1]);
        let mut f = SparseRows::new(blocks.total_rows(), 3);
        f.set(blocks.cell_row(0, 0, 0), 0, 1.0);
        f.set(blocks.cell_row(0, 0, 1), 1, 1.0);
        f.set(blocks.cell_row(0, 1, 1), 2, 1.0);
        f.set(blocks.cell_row(1, 0, 0), 1, -1.0);
        f.set(blocks.cell_row(1, 0, 0), 0, 0.5);
        LiftedProblem {
            block_struct: blocks,
            f,
            objective: vec![1.0, 0.0],
            constant_term: 0.0,
        }
    }

    #[test]
    fn test_sdpa_entries_grouped_by_variable() {
        let entries = problem().sdpa_entries();
        let vars: Vec<usize> = entries.iter().map(|e| e.var).collect();
        assert_eq!(vars, vec![0, 0, 1, 1, 2]);

        // constant entries are negated
        assert_eq!(entries[0], SdpaEntry { var: 0, block: 1, i: 1, j: 1, value: -1.0 });
        assert_eq!(entries[1], SdpaEntry { var: 0, block: 2, i: 1, j: 1, value: -0.5 });
        assert_eq!(entries[2], SdpaEntry { var: 1, block: 1, i: 1, j: 2, value: 1.0 });
        assert_eq!(entries[3], SdpaEntry { var: 1, block: 2, i: 1, j: 1, value: -1.0 });
    }

    #[test]
    fn test_sdpa_text() {
        let text = problem().to_sdpa();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "2");
        assert_eq!(lines[1], "2");
        assert_eq!(lines[2], "2 -1");
        assert_eq!(lines[3], "1 0");
        assert_eq!(lines[4], "0 1 1 1 -1");
        assert_eq!(lines.len(), 4 + 5);
    }

    #[test]
    fn test_human_readable() {
        let p = problem();
        let f = p.f.map(|v| Complex64::new(v, 0.0));
        let names = vec!["X".to_string(), "X^2".to_string()];
        let hr = human_readable(&p.block_struct, &f, &p.objective, 0.5, &names);

        assert_eq!(hr.objective, "0.5 + X");
        assert_eq!(hr.blocks[0][0][0], "1");
        assert_eq!(hr.blocks[0][0][1], "X");
        assert_eq!(hr.blocks[0][1][0], "X");
        assert_eq!(hr.blocks[0][1][1], "X^2");
        assert_eq!(hr.blocks[1][0][0], "0.5 - X");
    }

    #[test]
    fn test_complex_coefficients() {
        assert_eq!(format_coeff(Complex64::new(1.0, -2.0)), "(1-2i)");
        let names = vec!["A".to_string()];
        assert_eq!(format_terms([(1, Complex64::new(0.0, 1.0))], &names), "(0+1i)*A");
        assert_eq!(format_terms([(2, Complex64::new(2.0, 0.0))], &names), "2*y2");
    }
}
