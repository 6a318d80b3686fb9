//! Human-readable rendering of assignments, costs and tiling plans.
//!
//! * [`AssignmentTable`] – one visit as a table
//!   `TargetID | Cobra | X [mm] | Y [mm] | RA [deg] | Dec [deg]`, cobra numbers 1-based.
//!   Its `Display` uses `comfy-table`; [`AssignmentTable::write`] stores a fixed-width text
//!   version.
//! * `Display` for [`CostBreakdown`].
//! * [`write_tiling_log`] – per-tile pointing and assignment list of a [`TilingPlan`].
use std::fmt::{self, Write as _};
use std::fs;

use camino::Utf8Path;
use itertools::Itertools;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Row, Table};

use crate::catalog::Target;
use crate::constants::{FpPosition, VisitAssignment};
use crate::fiberassign_errors::FiberAssignError;
use crate::netflow::CostBreakdown;
use crate::strategy::TilingPlan;

/// Table view of one visit assignment.
///
/// Rows are sorted by cobra.
pub struct AssignmentTable<'a> {
    targets: &'a [Target],
    positions: &'a [FpPosition],
    assignment: &'a VisitAssignment,
}

impl<'a> AssignmentTable<'a> {
    pub fn new(
        targets: &'a [Target],
        positions: &'a [FpPosition],
        assignment: &'a VisitAssignment,
    ) -> Self {
        AssignmentTable {
            targets,
            positions,
            assignment,
        }
    }

    /// `(target, cobra)` pairs sorted by cobra, skipping targets unknown to the table.
    fn rows(&self) -> Vec<(usize, usize)> {
        self.assignment
            .iter()
            .filter(|(&t, _)| t < self.targets.len() && t < self.positions.len())
            .map(|(&t, &c)| (t, c))
            .sorted_by_key(|&(_, c)| c)
            .collect()
    }

    /// Fixed-width text version of the table.
    pub fn to_plain(&self) -> String {
        let mut out = format!(
            "{:>12}{:>8}{:>12}{:>12}{:>14}{:>14}\n",
            "TargetID", "Cobra", "X", "Y", "RA", "Dec"
        );
        for (t, c) in self.rows() {
            let target = &self.targets[t];
            let pos = self.positions[t];
            // writing into a String cannot fail
            let _ = writeln!(
                out,
                "{:>12}{:>8}{:>12.5}{:>12.5}{:>14.8}{:>14.8}",
                target.id,
                c + 1,
                pos.re,
                pos.im,
                target.ra,
                target.dec
            );
        }
        out
    }

    /// Write [`to_plain`](Self::to_plain) to `path`.
    pub fn write(&self, path: impl AsRef<Utf8Path>) -> Result<(), FiberAssignError> {
        fs::write(path.as_ref(), self.to_plain())?;
        Ok(())
    }
}

impl fmt::Display for AssignmentTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.set_header(vec![
            Cell::new("TargetID"),
            Cell::new("Cobra"),
            Cell::new("X [mm]"),
            Cell::new("Y [mm]"),
            Cell::new("RA [deg]"),
            Cell::new("Dec [deg]"),
        ]);

        for (t, c) in self.rows() {
            let target = &self.targets[t];
            let pos = self.positions[t];
            table.add_row(Row::from(vec![
                Cell::new(&target.id),
                Cell::new(c + 1).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.5}", pos.re)).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.5}", pos.im)).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.8}", target.ra)).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.8}", target.dec)).set_alignment(CellAlignment::Right),
            ]));
        }

        write!(f, "{table}")
    }
}

impl fmt::Display for CostBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Assignment cost")?;
            writeln!(f, "---------------")?;
            writeln!(f, "  visits                 {:>16.4}", self.visit_cost)?;
            writeln!(f, "  cobra moves            {:>16.4}", self.move_cost)?;
            writeln!(
                f,
                "  partial observations   {:>16.4}   ({} targets)",
                self.partial_cost, self.n_partial
            )?;
            writeln!(
                f,
                "  unobserved targets     {:>16.4}   ({} targets)",
                self.non_observation_cost, self.n_unobserved
            )?;
            writeln!(
                f,
                "  calibration shortfall  {:>16.4}   ({} missing)",
                self.calibration_cost, self.calibration_shortfall
            )?;
            writeln!(f, "  total                  {:>16.4}", self.total())?;
            write!(f, "  complete targets: {}", self.n_complete)
        } else {
            write!(
                f,
                "cost {:.4} (complete {}, partial {}, unobserved {}, calibration missing {})",
                self.total(),
                self.n_complete,
                self.n_partial,
                self.n_unobserved,
                self.calibration_shortfall
            )
        }
    }
}

/// Write the pointing and the target/fiber list of every tile of `plan`.
///
/// `targets` must be the catalog the plan was computed for.
pub fn write_tiling_log(
    path: impl AsRef<Utf8Path>,
    plan: &TilingPlan,
    targets: &[Target],
) -> Result<(), FiberAssignError> {
    let mut out = String::new();
    for (i, tile) in plan.tiles.iter().enumerate() {
        let _ = writeln!(
            out,
            "Exposure {i}: duration {}s, RA: {}, DEC {} PA: {}",
            tile.duration, tile.telescope.ra, tile.telescope.dec, tile.telescope.posang
        );
        let _ = writeln!(out, "  Target     Fiber        RA       DEC");
        for (&t, &c) in &tile.assignment {
            let Some(target) = targets.get(t) else {
                return Err(FiberAssignError::InvalidParameter(format!(
                    "tile {i} refers to unknown target {t}"
                )));
            };
            let _ = writeln!(
                out,
                "{:>8}{:>10}{:>10.5}{:>10.5}",
                target.id,
                c + 1,
                target.ra,
                target.dec
            );
        }
    }
    fs::write(path.as_ref(), out)?;
    Ok(())
}

#[cfg(test)]
mod display_test {
    use super::*;
    use crate::strategy::Tile;
    use crate::telescope::Telescope;
    use nalgebra::Complex;

    fn sample() -> (Vec<Target>, Vec<FpPosition>, VisitAssignment) {
        let targets = vec![
            Target::science("ID1", 34.0, -4.5, 900.0, 1, "sci"),
            Target::science("ID2", 34.1, -4.4, 900.0, 2, "sci"),
        ];
        let positions = vec![Complex::new(1.5, -2.0), Complex::new(-10.25, 3.0)];
        (targets, positions, VisitAssignment::from([(0, 7), (1, 2)]))
    }

    #[test]
    fn test_plain_table() {
        let (targets, positions, assignment) = sample();
        let plain = AssignmentTable::new(&targets, &positions, &assignment).to_plain();
        let lines: Vec<&str> = plain.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("TargetID"));
        // sorted by cobra, 1-based
        assert!(lines[1].trim_start().starts_with("ID2"));
        assert!(lines[1].contains(" 3 "));
        assert!(lines[2].contains("-2.00000"));
    }

    #[test]
    fn test_comfy_table() {
        let (targets, positions, assignment) = sample();
        let rendered = AssignmentTable::new(&targets, &positions, &assignment).to_string();
        assert!(rendered.contains("Cobra"));
        assert!(rendered.contains("-10.25000"));
        assert!(rendered.contains("ID1"));
    }

    #[test]
    fn test_cost_display() {
        let cost = CostBreakdown {
            visit_cost: 1.5,
            non_observation_cost: 10.0,
            n_complete: 3,
            n_unobserved: 1,
            ..Default::default()
        };
        assert_eq!(
            cost.to_string(),
            "cost 11.5000 (complete 3, partial 0, unobserved 1, calibration missing 0)"
        );
        assert!(format!("{cost:#}").contains("total"));
    }

    #[test]
    fn test_write_files() {
        let (targets, positions, assignment) = sample();
        let dir = std::env::temp_dir();
        let table_path = Utf8Path::from_path(&dir).unwrap().join("fiberassign_table_test.txt");
        AssignmentTable::new(&targets, &positions, &assignment)
            .write(&table_path)
            .unwrap();
        assert!(fs::read_to_string(&table_path).unwrap().contains("ID1"));

        let plan = TilingPlan {
            tiles: vec![Tile {
                telescope: Telescope::new(34.0, -4.5, 0.0, "2016-04-03T08:00:00Z").unwrap(),
                assignment: assignment.clone(),
                duration: 900.0,
                fiber_fraction: 0.5,
                completed_fraction: 1.0,
            }],
            total_time: 1800.0,
            observed_time: 1800.0,
        };
        let log_path = Utf8Path::from_path(&dir).unwrap().join("fiberassign_tiling_test.txt");
        write_tiling_log(&log_path, &plan, &targets).unwrap();
        let log = fs::read_to_string(&log_path).unwrap();
        assert!(log.starts_with("Exposure 0: duration 900s"));
        assert_eq!(log.lines().count(), 4);

        assert!(write_tiling_log(&log_path, &plan, &targets[..1]).is_err());
        let _ = fs::remove_file(table_path);
        let _ = fs::remove_file(log_path);
    }
}
