/// Batch converter orchestrating descriptor discovery, material baking,
/// mesh export and model compilation.
use crate::compiler::{CompileError, ModelCompiler};
use crate::config::RunConfig;
use crate::constants::{DESCRIPTOR_EXTENSION, GAME_SUBDIR, MATERIAL_ROOT};
use crate::descriptor::{QuixelAsset, ReadOptions, read_descriptor};
use crate::lod_selection::{LodError, base_lod_distance, select_lods};
use crate::material::{MaterialBaker, MaterialError, build_request, make_vmt};
use crate::mesh_import::{MeshImportError, MeshImporter};
use crate::qc_writer::QcScript;
use crate::smd_writer::{SmdError, write_smd};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Per-asset failure. One of these aborts the current asset only; the
/// batch moves on to the next one.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Lod(#[from] LodError),
    #[error(transparent)]
    MeshImport(#[from] MeshImportError),
    #[error(transparent)]
    Smd(#[from] SmdError),
    #[error(transparent)]
    Material(#[from] MaterialError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("failed to write artifact: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Stage name reported next to the asset when a failure is surfaced.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Lod(_) => "model selection",
            PipelineError::MeshImport(_) => "mesh import",
            PipelineError::Smd(_) => "mesh export",
            PipelineError::Material(_) => "material bake",
            PipelineError::Compile(_) => "model compile",
            PipelineError::Io(_) => "artifact write",
        }
    }
}

/// Outcome counts for one conversion run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Derived naming for one asset's export artifacts.
struct ModelNames {
    /// Bare stream/script stem, the `gameName` basename.
    stem: String,
    /// Compiled model name referenced by `$modelname`.
    model_name: String,
    /// Search directory referenced by `$cdmaterials`.
    material_dir: String,
    /// Material basename written into each triangle block.
    material: String,
}

impl ModelNames {
    fn for_asset(asset: &QuixelAsset) -> Self {
        let stem = match asset.game_name.rsplit_once('/') {
            Some((_, stem)) => stem.to_string(),
            None => asset.game_name.clone(),
        };
        let material_dir = match asset.game_name.rsplit_once('/') {
            Some((parent, _)) => format!("{MATERIAL_ROOT}/{parent}"),
            None => MATERIAL_ROOT.to_string(),
        };
        let material = match asset.material_name.rsplit_once('/') {
            Some((_, name)) => name.to_string(),
            None => asset.material_name.clone(),
        };
        Self {
            stem,
            model_name: format!("{}.mdl", asset.game_name),
            material_dir,
            material,
        }
    }
}

/// Sequential batch converter. Collaborating tools sit behind trait
/// objects so tests and future formats can substitute them.
pub struct MegascansConverter {
    config: RunConfig,
    importer: Box<dyn MeshImporter>,
    baker: Box<dyn MaterialBaker>,
    compiler: Box<dyn ModelCompiler>,
    /// Material identities finished earlier in this run.
    completed_materials: HashSet<String>,
}

impl MegascansConverter {
    pub fn new(
        config: RunConfig,
        importer: Box<dyn MeshImporter>,
        baker: Box<dyn MaterialBaker>,
        compiler: Box<dyn ModelCompiler>,
    ) -> Self {
        Self {
            config,
            importer,
            baker,
            compiler,
            completed_materials: HashSet::new(),
        }
    }

    /// Walks `root` and collects assets from the first descriptor that
    /// parses successfully in each directory. Descriptors that fail to
    /// parse are reported and skipped; subdirectories are always visited,
    /// but never through symlinks. Entries are visited in name order so
    /// runs are deterministic.
    pub fn discover_assets(&self, root: &Path) -> Vec<(PathBuf, QuixelAsset)> {
        let options = ReadOptions {
            resolution: self.config.resolution_string(),
            texture_mime: self.config.texture_mime.clone(),
            mesh_mime: self.config.mesh_mime.clone(),
        };
        let mut found = Vec::new();
        self.scan_directory(root, &options, &mut found);
        found
    }

    fn scan_directory(
        &self,
        dir: &Path,
        options: &ReadOptions,
        found: &mut Vec<(PathBuf, QuixelAsset)>,
    ) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };

        let mut paths: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
        paths.sort();

        for path in paths.iter().filter(|p| p.is_file()) {
            let is_descriptor = path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy() == DESCRIPTOR_EXTENSION);
            if !is_descriptor {
                continue;
            }

            match read_descriptor(path, options) {
                Ok(assets) if !assets.is_empty() => {
                    println!("- [Succeeded]:  {}", path.display());
                    for asset in assets {
                        found.push((path.clone(), asset));
                    }
                    break;
                }
                Ok(_) => println!("- [Failed]:     {}", path.display()),
                Err(err) => println!("- [Failed]:     {} ({err})", path.display()),
            }
        }

        // Symlinked directories are skipped so a link cycle under the
        // root cannot recurse forever.
        for path in paths.iter().filter(|p| p.is_dir() && !p.is_symlink()) {
            self.scan_directory(path, options, found);
        }
    }

    /// Creates the game output roots. Existing directories are fine.
    fn bootstrap_output_dirs(&self) -> std::io::Result<()> {
        let game_path = &self.config.game_path;
        fs::create_dir_all(
            game_path
                .join("materials")
                .join(MATERIAL_ROOT)
                .join(GAME_SUBDIR),
        )?;
        fs::create_dir_all(game_path.join("models").join(GAME_SUBDIR))?;
        fs::create_dir_all(game_path.join("modelsrc").join(GAME_SUBDIR))?;
        Ok(())
    }

    /// Converts every discovered asset in order, containing per-asset
    /// failures, and returns the outcome counts.
    pub fn run(
        &mut self,
        assets: &[(PathBuf, QuixelAsset)],
    ) -> Result<RunSummary, Box<dyn std::error::Error>> {
        self.bootstrap_output_dirs()?;

        let pb = ProgressBar::new(assets.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.green/blue}] {pos}/{len} assets ({percent}%) {msg}")
                .unwrap()
                .progress_chars("▉▊▋▌▍▎▏ "),
        );
        pb.set_message("Converting assets");

        let mut summary = RunSummary::default();
        for (descriptor_path, asset) in assets {
            match self.process_asset(descriptor_path, asset) {
                Ok(()) => summary.succeeded += 1,
                Err(err) => {
                    summary.failed += 1;
                    println!(
                        "\nERROR: {} failed during {}: {}",
                        asset.name,
                        err.stage(),
                        err
                    );
                }
            }
            pb.inc(1);
        }
        pb.finish_with_message("Assets converted");

        Ok(summary)
    }

    fn process_asset(
        &mut self,
        descriptor_path: &Path,
        asset: &QuixelAsset,
    ) -> Result<(), PipelineError> {
        if self.completed_materials.contains(&asset.material_name) {
            println!("\nSkipping material for {} (Already completed)", asset.name);
        } else {
            println!("\nProcessing material for {}", asset.name);
            self.process_material(descriptor_path, asset)?;
            // Marked done only on success so a later asset sharing the
            // material retries a failed bake.
            self.completed_materials.insert(asset.material_name.clone());
        }

        println!("\nProcessing meshes for {} ...", asset.name);
        self.export_model(descriptor_path, asset)?;

        println!("\nCompiling meshes for {} ...", asset.name);
        self.compile_model(asset)?;

        Ok(())
    }

    /// Bakes the asset's shared material and writes the description plus
    /// every baked texture under `materials/`.
    fn process_material(
        &self,
        descriptor_path: &Path,
        asset: &QuixelAsset,
    ) -> Result<(), PipelineError> {
        let request = build_request(descriptor_path, asset, self.config.resolution);
        let material = self.baker.bake(&request)?;

        let materials_root = self.config.game_path.join("materials");

        let vmt_path = materials_root.join(format!("{}.vmt", material.name));
        println!("- Writing VMT to {}", vmt_path.display());
        fs::write(&vmt_path, make_vmt(&request))?;

        println!(
            "- Writing {} textures to {}_*.vtf",
            material.textures.len(),
            materials_root.join(&material.name).display()
        );
        for texture in &material.textures {
            let texture_path =
                materials_root.join(format!("{}{}.vtf", material.name, texture.suffix));
            fs::write(&texture_path, &texture.data)?;
        }

        Ok(())
    }

    /// Exports the primary stream, every selected LOD stream and the
    /// build script under `modelsrc/`.
    fn export_model(
        &self,
        descriptor_path: &Path,
        asset: &QuixelAsset,
    ) -> Result<(), PipelineError> {
        let source_folder = descriptor_path.parent().unwrap_or(Path::new("."));
        let names = ModelNames::for_asset(asset);

        let modelsrc = self.config.game_path.join("modelsrc");
        let smd_path = modelsrc.join(format!("{}.smd", asset.game_name));
        let qc_path = modelsrc.join(format!("{}.qc", asset.game_name));

        println!("| Source: {}", source_folder.display());
        println!("| Target path: {}", smd_path.display());
        println!("| Compiled name: {}", names.model_name);

        let plan = select_lods(&asset.models, base_lod_distance(asset))?;
        println!(
            "| Picked primary model ({}) ({} tris)",
            plan.primary.path, plan.primary.tri_count
        );

        let primary = self.importer.import(&source_folder.join(&plan.primary.path))?;
        write_smd(&smd_path, &primary, &names.material)?;

        let mut script = QcScript::new(&names.model_name, &names.material_dir, &names.stem);
        for (index, lod) in plan.lods.iter().enumerate() {
            println!(
                "| Picked LOD-{} ({}) ({} tris) (distance={})",
                lod.model.lod - 1,
                lod.model.path,
                lod.model.tri_count,
                lod.distance
            );

            let replacement = format!("{}_lod{}.smd", names.stem, index);
            let lod_mesh = self.importer.import(&source_folder.join(&lod.model.path))?;
            write_smd(&smd_path.with_file_name(&replacement), &lod_mesh, &names.material)?;
            script.push_lod(lod.distance, &replacement);
        }

        script.write(&qc_path)?;
        Ok(())
    }

    fn compile_model(&self, asset: &QuixelAsset) -> Result<(), PipelineError> {
        let qc_path = self
            .config
            .game_path
            .join("modelsrc")
            .join(format!("{}.qc", asset.game_name));
        self.compiler.compile(&qc_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{BakedMaterial, BakedTexture, MaterialRequest};
    use crate::mesh_import::ObjImporter;
    use std::cell::RefCell;
    use std::fs::File;
    use std::io::Write;
    use std::rc::Rc;

    const OBJ: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nvn 0 0 1\nf 1/1/1 2/2/1 3/3/1\n";

    fn single_descriptor(name: &str) -> String {
        let mesh =
            r#"{"uris": [{"mimeType": "application/x-obj", "uri": "rock.obj"}], "tris": 1}"#;
        format!(
            r#"{{
                "name": "{name}",
                "pack": null,
                "properties": [{{"key": "size", "value": "medium"}}],
                "components": [],
                "meshes": [{mesh}, {mesh}, {mesh}]
            }}"#
        )
    }

    fn collection_descriptor(name: &str) -> String {
        let mut models = Vec::new();
        for variation in [1, 2] {
            for lod in 0..3 {
                models.push(format!(
                    r#"{{"mimeType": "application/x-obj", "uri": "rock.obj", "variation": {variation}, "lod": {lod}}}"#
                ));
            }
        }
        format!(
            r#"{{
                "name": "{name}",
                "pack": {{"name": "Test Pack"}},
                "properties": [],
                "maps": [],
                "models": [{}]
            }}"#,
            models.join(",")
        )
    }

    fn write_asset_dir(root: &Path, folder: &str, descriptor: &str) -> PathBuf {
        let dir = root.join(folder);
        fs::create_dir_all(&dir).unwrap();
        File::create(dir.join("rock.obj"))
            .unwrap()
            .write_all(OBJ.as_bytes())
            .unwrap();
        let descriptor_path = dir.join("asset.json");
        File::create(&descriptor_path)
            .unwrap()
            .write_all(descriptor.as_bytes())
            .unwrap();
        descriptor_path
    }

    fn test_config(game_path: &Path) -> RunConfig {
        RunConfig {
            bin_path: game_path.join("bin"),
            game_path: game_path.to_path_buf(),
            resolution: 2048,
            texture_mime: "image/jpeg".to_string(),
            mesh_mime: "application/x-obj".to_string(),
        }
    }

    #[derive(Default)]
    struct BakeLog {
        names: RefCell<Vec<String>>,
        fail_first: RefCell<bool>,
    }

    struct RecordingBaker {
        log: Rc<BakeLog>,
    }

    impl MaterialBaker for RecordingBaker {
        fn bake(&self, request: &MaterialRequest) -> Result<BakedMaterial, MaterialError> {
            self.log.names.borrow_mut().push(request.name.clone());
            if self.log.fail_first.replace(false) {
                return Err(MaterialError::Bake("simulated failure".to_string()));
            }
            Ok(BakedMaterial {
                name: request.name.clone(),
                textures: vec![BakedTexture {
                    suffix: String::new(),
                    data: b"vtf".to_vec(),
                }],
            })
        }
    }

    #[derive(Default)]
    struct CompileLog {
        scripts: RefCell<Vec<PathBuf>>,
        fail_first: RefCell<bool>,
    }

    struct RecordingCompiler {
        log: Rc<CompileLog>,
    }

    impl ModelCompiler for RecordingCompiler {
        fn compile(&self, script_path: &Path) -> Result<(), CompileError> {
            self.log.scripts.borrow_mut().push(script_path.to_path_buf());
            if self.log.fail_first.replace(false) {
                return Err(CompileError::Launch(std::io::Error::other(
                    "simulated failure",
                )));
            }
            Ok(())
        }
    }

    fn converter(
        game_path: &Path,
    ) -> (MegascansConverter, Rc<BakeLog>, Rc<CompileLog>) {
        let bake_log = Rc::new(BakeLog::default());
        let compile_log = Rc::new(CompileLog::default());
        let converter = MegascansConverter::new(
            test_config(game_path),
            Box::new(ObjImporter),
            Box::new(RecordingBaker {
                log: bake_log.clone(),
            }),
            Box::new(RecordingCompiler {
                log: compile_log.clone(),
            }),
        );
        (converter, bake_log, compile_log)
    }

    #[test]
    fn converts_a_single_asset_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("library");
        write_asset_dir(&root, "boulder", &single_descriptor("Mossy Boulder"));

        let (mut converter, bake_log, compile_log) = converter(dir.path());
        let assets = converter.discover_assets(&root);
        assert_eq!(assets.len(), 1);

        let summary = converter.run(&assets).unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 0);

        let modelsrc = dir.path().join("modelsrc/props_megascans");
        let smd = fs::read_to_string(modelsrc.join("mossy_boulder_asset.smd")).unwrap();
        assert!(smd.starts_with("version 1\n"));
        assert!(smd.contains("mossy_boulder_asset\n0\t"));
        assert!(smd.ends_with("end"));

        let qc = fs::read_to_string(modelsrc.join("mossy_boulder_asset.qc")).unwrap();
        assert!(qc.starts_with("$modelname \"props_megascans/mossy_boulder_asset.mdl\""));
        assert!(qc.contains("$cdmaterials \"models/props_megascans\""));
        assert!(qc.contains("$body studio \"mossy_boulder_asset\""));
        // Three meshes leave no LOD candidates past the primary.
        assert!(!qc.contains("$lod"));

        let materials = dir.path().join("materials/models/props_megascans");
        assert!(materials.join("mossy_boulder_asset.vmt").exists());
        assert_eq!(
            fs::read(materials.join("mossy_boulder_asset.vtf")).unwrap(),
            b"vtf"
        );

        assert_eq!(
            bake_log.names.borrow().as_slice(),
            ["models/props_megascans/mossy_boulder_asset"]
        );
        assert_eq!(compile_log.scripts.borrow().len(), 1);
        assert!(
            compile_log.scripts.borrow()[0].ends_with("modelsrc/props_megascans/mossy_boulder_asset.qc")
        );
    }

    #[test]
    fn collection_variants_share_one_material_bake() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("library");
        write_asset_dir(&root, "grass", &collection_descriptor("Meadow Grass"));

        let (mut converter, bake_log, compile_log) = converter(dir.path());
        let assets = converter.discover_assets(&root);
        assert_eq!(assets.len(), 2);

        let summary = converter.run(&assets).unwrap();
        assert_eq!(summary.succeeded, 2);

        // One bake for the shared identity, one compile per variant.
        assert_eq!(bake_log.names.borrow().len(), 1);
        assert_eq!(compile_log.scripts.borrow().len(), 2);

        let modelsrc = dir.path().join("modelsrc/props_megascans");
        assert!(modelsrc.join("meadow_grass_asset_1.smd").exists());
        assert!(modelsrc.join("meadow_grass_asset_2.smd").exists());
        assert!(modelsrc.join("meadow_grass_asset_1.qc").exists());

        let materials = dir.path().join("materials/models/props_megascans");
        assert!(materials.join("meadow_grass_asset.vmt").exists());
    }

    #[test]
    fn discovery_stops_at_first_successful_descriptor_per_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("library");

        let boulder_dir = root.join("boulder");
        write_asset_dir(&root, "boulder", &single_descriptor("Boulder"));
        // Sorts before asset.json and fails to parse.
        File::create(boulder_dir.join("a_broken.json"))
            .unwrap()
            .write_all(b"{\"name\": 3")
            .unwrap();
        // Sorts after asset.json and must never be picked up.
        File::create(boulder_dir.join("z_extra.json"))
            .unwrap()
            .write_all(single_descriptor("Extra").as_bytes())
            .unwrap();

        write_asset_dir(&root, "boulder/nested", &single_descriptor("Nested"));

        let (converter, _, _) = converter(dir.path());
        let assets = converter.discover_assets(&root);

        let names: Vec<&str> = assets.iter().map(|(_, a)| a.name.as_str()).collect();
        assert_eq!(names, ["Boulder", "Nested"]);
    }

    #[cfg(unix)]
    #[test]
    fn discovery_does_not_follow_directory_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("library");
        write_asset_dir(&root, "boulder", &single_descriptor("Boulder"));
        // A link back to the root must not recurse forever or duplicate
        // the assets reachable through it.
        std::os::unix::fs::symlink(&root, root.join("boulder/loop")).unwrap();

        let (converter, _, _) = converter(dir.path());
        let assets = converter.discover_assets(&root);

        let names: Vec<&str> = assets.iter().map(|(_, a)| a.name.as_str()).collect();
        assert_eq!(names, ["Boulder"]);
    }

    #[test]
    fn empty_descriptor_result_does_not_stop_the_directory_scan() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("library");

        let rock_dir = root.join("rock");
        write_asset_dir(&root, "rock", &single_descriptor("Rock"));
        // Valid JSON whose only model is in a foreign format, so it parses
        // to zero assets and the scan moves on to asset.json.
        File::create(rock_dir.join("a_foreign.json"))
            .unwrap()
            .write_all(
                br#"{"name": "Foreign", "pack": {"name": "P"}, "properties": [], "maps": [], "models": [{"mimeType": "application/x-fbx", "uri": "a.fbx", "variation": 1}]}"#,
            )
            .unwrap();

        let (converter, _, _) = converter(dir.path());
        let assets = converter.discover_assets(&root);

        let names: Vec<&str> = assets.iter().map(|(_, a)| a.name.as_str()).collect();
        assert_eq!(names, ["Rock"]);
    }

    #[test]
    fn compile_failure_is_contained_to_its_asset() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("library");
        write_asset_dir(&root, "alpha", &single_descriptor("Alpha Rock"));
        write_asset_dir(&root, "beta", &single_descriptor("Beta Rock"));

        let (mut converter, _, compile_log) = converter(dir.path());
        *compile_log.fail_first.borrow_mut() = true;

        let assets = converter.discover_assets(&root);
        assert_eq!(assets.len(), 2);

        let summary = converter.run(&assets).unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(compile_log.scripts.borrow().len(), 2);
    }

    #[test]
    fn failed_bake_is_retried_by_the_next_sharing_asset() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("library");
        write_asset_dir(&root, "grass", &collection_descriptor("Meadow Grass"));

        let (mut converter, bake_log, _) = converter(dir.path());
        *bake_log.fail_first.borrow_mut() = true;

        let assets = converter.discover_assets(&root);
        let summary = converter.run(&assets).unwrap();

        // Variant 1 fails at the bake; variant 2 retries the shared
        // material instead of skipping it.
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(bake_log.names.borrow().len(), 2);
    }
}
