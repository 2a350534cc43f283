/// QC build-script generation for the model compiler
use std::fs;
use std::io;
use std::path::Path;

/// Line-oriented QC directive script for one static prop.
///
/// The preamble is fixed: Megascans sources are Y-up and every converted
/// asset compiles as a static prop with an idle sequence over the single
/// body stream.
pub struct QcScript {
    body: String,
    lines: Vec<String>,
}

impl QcScript {
    /// Starts a script for `model_name` (the compiled, game-relative
    /// `.mdl` name). `body` is the bare stream stem shared by `$body`,
    /// `$sequence` and LOD replacements.
    pub fn new(model_name: &str, material_dir: &str, body: &str) -> Self {
        let lines = vec![
            format!("$modelname \"{model_name}\""),
            format!("$cdmaterials \"{material_dir}\""),
            "$staticprop".to_string(),
            "$upaxis Y".to_string(),
            format!("$body studio \"{body}\""),
            format!("$sequence idle \"{body}\""),
        ];
        Self {
            body: body.to_string(),
            lines,
        }
    }

    /// Appends a `$lod` block that swaps the body stream for `replacement`
    /// past `distance`. Blocks must be appended in increasing distance
    /// order.
    pub fn push_lod(&mut self, distance: u32, replacement: &str) {
        self.lines.push(format!("$lod {distance}"));
        self.lines.push("{".to_string());
        self.lines
            .push(format!("\treplacemodel \"{}\" \"{replacement}\"", self.body));
        self.lines.push("}".to_string());
    }

    /// Renders the script, directives joined by newlines with no trailing
    /// newline.
    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    pub fn write(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_matches_static_prop_layout() {
        let script = QcScript::new(
            "props_megascans/mossy_boulder_abcdef.mdl",
            "models/props_megascans",
            "mossy_boulder_abcdef",
        );

        let expected = "\
$modelname \"props_megascans/mossy_boulder_abcdef.mdl\"
$cdmaterials \"models/props_megascans\"
$staticprop
$upaxis Y
$body studio \"mossy_boulder_abcdef\"
$sequence idle \"mossy_boulder_abcdef\"";
        assert_eq!(script.render(), expected);
    }

    #[test]
    fn lod_blocks_replace_the_body_stream() {
        let mut script = QcScript::new(
            "props_megascans/mossy_boulder_abcdef.mdl",
            "models/props_megascans",
            "mossy_boulder_abcdef",
        );
        script.push_lod(20, "mossy_boulder_abcdef_lod0.smd");
        script.push_lod(40, "mossy_boulder_abcdef_lod1.smd");

        let rendered = script.render();
        let expected_block = "\
$lod 20
{
\treplacemodel \"mossy_boulder_abcdef\" \"mossy_boulder_abcdef_lod0.smd\"
}
$lod 40
{
\treplacemodel \"mossy_boulder_abcdef\" \"mossy_boulder_abcdef_lod1.smd\"
}";
        assert!(rendered.ends_with(expected_block));
        assert!(!rendered.ends_with('\n'));
    }

    #[test]
    fn render_has_no_trailing_newline() {
        let script = QcScript::new("a.mdl", "models", "a");
        assert!(!script.render().ends_with('\n'));
        assert_eq!(script.render().lines().count(), 6);
    }
}
