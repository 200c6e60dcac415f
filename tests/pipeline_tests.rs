//! Pipeline Tests
//!
//! End-to-end runs of the orchestrator against a fake tool runner that
//! writes deterministic descriptor and matrix files.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use genre::config::{CompiledLayout, EvaluationConfig, PipelineConfig, ReportFormat, ToolPaths};
use genre::pipeline::{Actions, Orchestrator, PipelineState};
use genre::tools::{flag_value, ToolOutput, ToolRunner};
use genre::{GenreError, Result};
use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};

/// Stands in for SMILExtract and openXBOW.
#[derive(Default)]
struct FakeTools {
    invocations: Mutex<Vec<String>>,
}

impl FakeTools {
    fn calls(&self, program: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == program)
            .count()
    }

    fn smile(&self, args: &[OsString]) -> Result<ToolOutput> {
        let output = PathBuf::from(flag_value(args, "-lldcsvoutput").unwrap());
        let name = flag_value(args, "-instname").unwrap().to_string_lossy().into_owned();
        fs::write(
            &output,
            format!("name;frameTime;f0\n'{}';0.00;1.0\n'{}';0.01;1.5\n", name, name),
        )?;
        Ok(ToolOutput::success())
    }

    /// Writes an ARFF matrix whose two features separate the labels.
    fn xbow(&self, args: &[OsString]) -> Result<ToolOutput> {
        let labels = PathBuf::from(flag_value(args, "-l").unwrap());
        let matrix = PathBuf::from(flag_value(args, "-o").unwrap());
        let codebook = PathBuf::from(flag_value(args, "-B").unwrap());

        let mut arff = String::from(
            "@relation xbow\n@attribute name string\n@attribute w0 numeric\n@attribute w1 numeric\n\
             @attribute class {music,speech}\n@data\n",
        );
        for (i, line) in fs::read_to_string(&labels)?.lines().skip(1).enumerate() {
            let (id, label) = line.split_once(';').unwrap();
            let jitter = i as f64 * 0.05;
            let (w0, w1) = if label == "music" { (4.0 + jitter, 0.5) } else { (0.5, 4.0 + jitter) };
            arff.push_str(&format!("'{}',{},{},{}\n", id, w0, w1, label));
        }
        fs::write(&matrix, arff)?;
        fs::write(&codebook, "codebook\n")?;
        Ok(ToolOutput::success())
    }
}

impl ToolRunner for FakeTools {
    fn run(&self, program: &Path, args: &[OsString]) -> Result<ToolOutput> {
        let name = program.to_string_lossy().into_owned();
        self.invocations.lock().unwrap().push(name.clone());
        match name.as_str() {
            "fake-smile" => self.smile(args),
            "fake-java" => self.xbow(args),
            _ => Ok(ToolOutput::failure(127, format!("{}: not found", name))),
        }
    }
}

fn write_wav(path: &Path, frequency: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 22050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..2205 {
        let t = i as f32 / 22050.0;
        let sample = (t * frequency * 2.0 * std::f32::consts::PI).sin();
        writer.write_sample((sample * 8000.0) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn fake_tool_paths() -> ToolPaths {
    ToolPaths {
        smilextract: PathBuf::from("fake-smile"),
        java: PathBuf::from("fake-java"),
        ..Default::default()
    }
}

/// Ten flat wavs, `a01..a05` music and `a06..a10` speech.
fn flat_dataset() -> (TempDir, PathBuf, PathBuf) {
    let dir = tempdir().unwrap();
    let wavs = dir.path().join("wavs");
    let compiled = dir.path().join("compiled");
    fs::create_dir_all(&wavs).unwrap();
    for i in 1..=10 {
        let label = if i <= 5 { "music" } else { "speech" };
        write_wav(&wavs.join(format!("a{:02}__{}.wav", i, label)), 220.0 * i as f32);
    }
    (dir, wavs, compiled)
}

#[test]
fn test_extract_compile_classify_with_cross_validation() {
    let (dir, wavs, compiled) = flat_dataset();
    let report_path = dir.path().join("report.json");

    let config = PipelineConfig {
        wavs: Some(wavs),
        compiled: Some(compiled.clone()),
        tools: fake_tool_paths(),
        evaluation: EvaluationConfig {
            cv_folds: 5,
            report_format: ReportFormat::Json,
            report_path: Some(report_path.clone()),
            ..Default::default()
        },
        ..Default::default()
    };
    let tools = FakeTools::default();
    let mut orchestrator = Orchestrator::new(config, &tools);

    let outcome = orchestrator
        .run(Actions {
            extract: true,
            compile: true,
            classify: true,
            ..Default::default()
        })
        .unwrap();

    assert_eq!(orchestrator.state(), &PipelineState::Done);
    assert_eq!(tools.calls("fake-smile"), 10);
    assert_eq!(tools.calls("fake-java"), 1);

    let layout = CompiledLayout::new(&compiled);
    assert_eq!(fs::read_dir(layout.lld_dir()).unwrap().count(), 10);
    assert!(layout.codebook_file().is_file());

    let report = outcome.report.unwrap();
    assert_eq!(report.predictions.len(), 10);
    assert!(report.class_metrics("music").is_some());
    assert!(report.class_metrics("speech").is_some());
    assert_eq!(report.overall.evaluated, 10);
    assert!(report_path.is_file());

    assert_eq!(
        orchestrator
            .history()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        vec!["Idle", "Extracting", "Compiling", "Classifying", "Done"]
    );
}

#[test]
fn test_classify_can_rerun_on_existing_matrix() {
    let (dir, wavs, compiled) = flat_dataset();
    let tools = FakeTools::default();
    let base = PipelineConfig {
        wavs: Some(wavs),
        compiled: Some(compiled),
        tools: fake_tool_paths(),
        ..Default::default()
    };

    Orchestrator::new(base.clone(), &tools)
        .run(Actions {
            extract: true,
            compile: true,
            ..Default::default()
        })
        .unwrap();

    let holdout = PipelineConfig {
        evaluation: EvaluationConfig {
            report_path: Some(dir.path().join("holdout.txt")),
            ..Default::default()
        },
        ..base
    };
    let outcome = Orchestrator::new(holdout, &tools)
        .run(Actions {
            classify: true,
            ..Default::default()
        })
        .unwrap();

    // 5 per class at 25%: 4 train, 1 test per class
    let report = outcome.report.unwrap();
    assert_eq!(report.predictions.len(), 2);
    assert!(report.train_accuracy.is_some());
    assert_eq!(tools.calls("fake-java"), 1);

    let text = fs::read_to_string(dir.path().join("holdout.txt")).unwrap();
    assert!(text.contains("Train accuracy"));
}

#[test]
fn test_mismatched_labels_fail_classification() {
    let (dir, wavs, compiled) = flat_dataset();
    let tools = FakeTools::default();
    let config = PipelineConfig {
        wavs: Some(wavs),
        compiled: Some(compiled.clone()),
        tools: fake_tool_paths(),
        evaluation: EvaluationConfig {
            report_path: Some(dir.path().join("report.txt")),
            ..Default::default()
        },
        ..Default::default()
    };

    Orchestrator::new(config.clone(), &tools)
        .run(Actions {
            extract: true,
            compile: true,
            ..Default::default()
        })
        .unwrap();

    // Drop one row from the label index after the matrix was built
    let labels = CompiledLayout::new(&compiled).label_file();
    let kept: Vec<String> = fs::read_to_string(&labels)
        .unwrap()
        .lines()
        .filter(|l| !l.starts_with("a03;"))
        .map(str::to_string)
        .collect();
    fs::write(&labels, kept.join("\n") + "\n").unwrap();

    let mut orchestrator = Orchestrator::new(config, &tools);
    let err = orchestrator
        .run(Actions {
            classify: true,
            ..Default::default()
        })
        .unwrap_err();

    match err.root() {
        GenreError::DataMismatch {
            only_in_matrix,
            only_in_labels,
        } => {
            assert_eq!(only_in_matrix, &vec!["a03".to_string()]);
            assert!(only_in_labels.is_empty());
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(matches!(
        orchestrator.state(),
        PipelineState::Failed { stage: "classify", .. }
    ));
}

#[test]
fn test_extractor_failure_stops_pipeline() {
    let (_dir, wavs, compiled) = flat_dataset();
    let tools = FakeTools::default();
    let config = PipelineConfig {
        wavs: Some(wavs),
        compiled: Some(compiled.clone()),
        tools: ToolPaths {
            smilextract: PathBuf::from("missing-smile"),
            ..fake_tool_paths()
        },
        ..Default::default()
    };

    let mut orchestrator = Orchestrator::new(config, &tools);
    let err = orchestrator.run(Actions::all()).unwrap_err();

    // -t has no --source, so nothing runs at all
    assert!(matches!(err, GenreError::MissingArgument { action: 't', .. }));
    assert_eq!(tools.calls("missing-smile"), 0);

    let err = orchestrator
        .run(Actions {
            extract: true,
            compile: true,
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err.error_code(), "EXTERNAL_TOOL");
    assert_eq!(tools.calls("fake-java"), 0);
    assert!(!CompiledLayout::new(&compiled).label_file().exists());
    assert!(matches!(
        orchestrator.state(),
        PipelineState::Failed { stage: "extract", .. }
    ));
}

#[test]
fn test_rerun_after_removing_a_wav() {
    let (dir, wavs, compiled) = flat_dataset();
    let tools = FakeTools::default();
    let config = PipelineConfig {
        wavs: Some(wavs.clone()),
        compiled: Some(compiled.clone()),
        tools: fake_tool_paths(),
        evaluation: EvaluationConfig {
            cv_folds: 2,
            report_path: Some(dir.path().join("report.txt")),
            ..Default::default()
        },
        ..Default::default()
    };
    let actions = Actions {
        extract: true,
        compile: true,
        classify: true,
        ..Default::default()
    };

    Orchestrator::new(config.clone(), &tools).run(actions).unwrap();
    fs::remove_file(wavs.join("a03__music.wav")).unwrap();
    let outcome = Orchestrator::new(config, &tools).run(actions).unwrap();

    let report = outcome.report.unwrap();
    assert_eq!(report.predictions.len(), 9);
    assert!(report.predictions.iter().all(|p| p.identifier != "a03"));
    assert!(!CompiledLayout::new(&compiled).lld_dir().join("a03.csv").exists());
}
