//! Checkpoint codec: binary (optionally gzip/bzip2-compressed) snapshots of
//! the configuration, parameter registry and node store, with separate
//! master/executor load modes (spec.md §4.F).

mod error;

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub use error::{LoadError, SaveError};
use paramcts_types::{ParameterSnapshot, ParameterStore};
use paramcts_tree::{Tree, TreeSnapshot};

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const BZIP_MAGIC: [u8; 2] = [0x42, 0x5A];

/// Everything checkpointed: the configuration fields that survive a
/// restore, including enough of the `ProgramCaller`'s inputs for an
/// executor rank to rebuild one without its HAL-JSON file, plus the
/// parameter registry and node store snapshots.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct CheckpointPayload {
    pub timeout_seconds: f64,
    pub instance_variable: String,
    pub executable: String,
    pub callstring_template: String,
    pub callstring_constants: HashMap<String, String>,
    pub prefix_cmd: String,
    pub stdout_patterns: Vec<String>,
    pub stderr_patterns: Vec<String>,
    pub parameters: ParameterSnapshot,
    pub tree: TreeSnapshot,
}

/// The subset of a [`CheckpointPayload`] an executor rank needs to rebuild
/// its `ProgramCaller` and know which assignment variable names the
/// instance file — everything except the search state, which only the
/// master touches.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CallerFields {
    pub instance_variable: String,
    pub timeout_seconds: f64,
    pub executable: String,
    pub callstring_template: String,
    pub callstring_constants: HashMap<String, String>,
    pub prefix_cmd: String,
    pub stdout_patterns: Vec<String>,
    pub stderr_patterns: Vec<String>,
}

impl CallerFields {
    fn from_payload(payload: &CheckpointPayload) -> Self {
        Self {
            instance_variable: payload.instance_variable.clone(),
            timeout_seconds: payload.timeout_seconds,
            executable: payload.executable.clone(),
            callstring_template: payload.callstring_template.clone(),
            callstring_constants: payload.callstring_constants.clone(),
            prefix_cmd: payload.prefix_cmd.clone(),
            stdout_patterns: payload.stdout_patterns.clone(),
            stderr_patterns: payload.stderr_patterns.clone(),
        }
    }
}

/// Compression to apply on save; load always auto-detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveCompression {
    None,
    Gzip,
}

/// `paramcts-<timestamp>-<hostname>.save`, mirroring
/// `'paramMCTS-{}-{}.save'.format(strftime(...), gethostname())` from the
/// original `paramMCTS.py::main`.
pub fn generate_state_name() -> String {
    let now = time::OffsetDateTime::now_utc();
    let format = time::format_description::parse("[year][month][day]-[hour][minute][second]")
        .expect("constant format description always parses");
    let stamp = now.format(&format).unwrap_or_else(|_| "unknown-time".to_string());
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    format!("paramcts-{stamp}-{host}.save")
}

pub fn save_dir() -> PathBuf {
    PathBuf::from("save")
}

/// Serializes `payload` to `save/<name>`, creating the directory if
/// needed, with optional gzip compression.
pub fn save(name: &str, payload: &CheckpointPayload, compression: SaveCompression) -> Result<PathBuf, SaveError> {
    save_in(save_dir(), name, payload, compression)
}

/// As [`save`], but under an explicit directory rather than the default
/// `save/` — used by tests so they don't have to mutate the process's
/// current directory.
pub fn save_in(
    dir: impl AsRef<Path>,
    name: &str,
    payload: &CheckpointPayload,
    compression: SaveCompression,
) -> Result<PathBuf, SaveError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .map_err(|source| SaveError::CreateDir { path: dir.display().to_string(), source })?;
    let path = dir.join(name);

    let bytes = bincode::serialize(payload)?;
    let mut file = std::fs::File::create(&path)
        .map_err(|source| SaveError::Write { path: path.display().to_string(), source })?;
    match compression {
        SaveCompression::None => {
            file.write_all(&bytes).map_err(|source| SaveError::Write { path: path.display().to_string(), source })?;
        }
        SaveCompression::Gzip => {
            let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            encoder
                .write_all(&bytes)
                .map_err(|source| SaveError::Write { path: path.display().to_string(), source })?;
            encoder
                .finish()
                .map_err(|source| SaveError::Write { path: path.display().to_string(), source })?;
        }
    }
    tracing::debug!(path = %path.display(), "checkpoint saved");
    Ok(path)
}

/// Reads and decodes a checkpoint, auto-detecting gzip/bzip2/plain by
/// magic bytes exactly like `configuration.py`'s `open_file`.
pub fn load(path: impl AsRef<Path>) -> Result<CheckpointPayload, LoadError> {
    let path = path.as_ref();
    let raw = std::fs::read(path).map_err(|source| LoadError::Read { path: path.display().to_string(), source })?;

    let magic = if raw.len() >= 2 { [raw[0], raw[1]] } else { [0, 0] };
    let bytes = match magic {
        GZIP_MAGIC => {
            let mut decoder = flate2::read::GzDecoder::new(&raw[..]);
            let mut buf = Vec::new();
            decoder.read_to_end(&mut buf).map_err(LoadError::Decompress)?;
            buf
        }
        BZIP_MAGIC => {
            let mut decoder = bzip2::read::BzDecoder::new(&raw[..]);
            let mut buf = Vec::new();
            decoder.read_to_end(&mut buf).map_err(LoadError::Decompress)?;
            buf
        }
        _ => raw,
    };

    Ok(bincode::deserialize(&bytes)?)
}

/// Master-mode restore: both registries come back verbatim, and the root
/// is valid (a `Tree` is rebuilt from the snapshot, not left empty).
pub fn apply_as_master(payload: CheckpointPayload) -> (Tree, CallerFields) {
    let fields = CallerFields::from_payload(&payload);
    paramcts_types::replace(ParameterStore::from_snapshot(payload.parameters));
    let tree = Tree::restore(payload.tree);
    (tree, fields)
}

/// Executor-mode restore: both registries are cleared and the tree is
/// discarded — an executor never needs the search state, only its own
/// `ProgramCaller`, which the checkpoint now carries the inputs for.
pub fn apply_as_executor(payload: CheckpointPayload) -> CallerFields {
    let fields = CallerFields::from_payload(&payload);
    paramcts_types::clear();
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use paramcts_types::Assignment;

    fn sample_payload() -> CheckpointPayload {
        let mut store = ParameterStore::new();
        store.intern("algo", vec!["a".into(), "b".into()], None);
        let mut tree = Tree::new();
        let mut rng = rand::thread_rng();
        tree.expand(tree.root(), &store, &mut rng).unwrap();
        let _ = Assignment::new("algo", "a");

        CheckpointPayload {
            timeout_seconds: 600.0,
            instance_variable: "ins".to_string(),
            executable: "/bin/true".to_string(),
            callstring_template: "$ins$ --algo $algo$".to_string(),
            callstring_constants: HashMap::new(),
            prefix_cmd: "bin/runsolver -W 600 -M 2000".to_string(),
            stdout_patterns: vec!["RESULT: $time$".to_string()],
            stderr_patterns: vec![],
            parameters: store.snapshot(),
            tree: tree.snapshot(),
        }
    }

    #[test]
    fn s5_round_trip_master_mode() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("paramcts-ckpt-test-master-{}-{nanos}", std::process::id()));

        let payload = sample_payload();
        let path = save_in(&dir, "test.save", &payload, SaveCompression::Gzip).unwrap();
        let loaded = load(&path).unwrap();
        let (tree, fields) = apply_as_master(loaded);

        assert_eq!(fields.timeout_seconds, 600.0);
        assert_eq!(fields.instance_variable, "ins");
        assert!(tree.node_count() >= 1);
        assert_eq!(paramcts_types::count(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn s5_round_trip_executor_mode_clears_registries() {
        paramcts_types::intern("leftover", vec!["x".into()], None);
        assert!(paramcts_types::count() >= 1);

        let payload = sample_payload();
        let fields = apply_as_executor(payload);
        assert_eq!(paramcts_types::count(), 0);
        assert_eq!(fields.executable, "/bin/true");
    }
}
