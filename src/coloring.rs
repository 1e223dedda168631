//! Field-type coloring.
//!
//! Smiffer encodes the semantic field type in the result file name; the
//! mapping from name substring to color is a compatibility contract with the
//! tool's naming convention, not a choice of this crate. The table is a
//! single ordered list where the first match wins.

/// A field type with its display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldColor {
    /// Lowercase substring looked for in the file stem.
    pub field: &'static str,
    /// Human-readable color family.
    pub name: &'static str,
    /// `#RRGGBB` value used for host color commands.
    pub hex: &'static str,
}

/// Ordered mapping table. `apbs-minus` must stay ahead of `apbs`: matching
/// is by substring, so the longer key is unreachable otherwise.
pub const FIELD_COLORS: &[FieldColor] = &[
    FieldColor {
        field: "hydrophobic",
        name: "yellow",
        hex: "#FFFF00",
    },
    FieldColor {
        field: "hydrophilic",
        name: "cyan",
        hex: "#4DD9FF",
    },
    FieldColor {
        field: "hbacceptors",
        name: "orange",
        hex: "#FF8000",
    },
    FieldColor {
        field: "hbdonors",
        name: "magenta",
        hex: "#B300FF",
    },
    FieldColor {
        field: "stacking",
        name: "green",
        hex: "#00FF00",
    },
    FieldColor {
        field: "apbs-minus",
        name: "red",
        hex: "#FF0000",
    },
    FieldColor {
        field: "apbs",
        name: "blue",
        hex: "#0000FF",
    },
];

/// Pick the color for a result file name (with or without directory and
/// extension). First matching table entry wins; unmatched files are left
/// uncolored.
pub fn color_for(file_name: &str) -> Option<&'static FieldColor> {
    let stem = std::path::Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_lowercase();
    FIELD_COLORS.iter().find(|entry| stem.contains(entry.field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_substring_selects_field() {
        let c = color_for("pocket_hydrophobic.dx").unwrap();
        assert_eq!(c.field, "hydrophobic");
        assert_eq!(c.hex, "#FFFF00");
    }

    #[test]
    fn first_table_entry_wins_on_ties() {
        // Both "hydrophobic" and "apbs" appear; table order decides.
        let c = color_for("hydrophobic_apbs_overlay.mrc").unwrap();
        assert_eq!(c.field, "hydrophobic");
    }

    #[test]
    fn apbs_minus_is_reachable() {
        assert_eq!(color_for("1abc_apbs-minus.dx").unwrap().field, "apbs-minus");
        assert_eq!(color_for("1abc_apbs.dx").unwrap().field, "apbs");
    }

    #[test]
    fn match_is_case_insensitive() {
        assert_eq!(color_for("POCKET_HBDonors.h5").unwrap().field, "hbdonors");
    }

    #[test]
    fn unmatched_files_stay_uncolored() {
        assert!(color_for("density.ccp4").is_none());
        assert!(color_for("").is_none());
    }

    #[test]
    fn full_paths_are_accepted() {
        let c = color_for("/data/out/x_stacking.cmap").unwrap();
        assert_eq!(c.name, "green");
    }
}
