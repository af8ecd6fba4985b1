//! Save flows to and rebuild them from checkpoints
use super::Flow;
use crate::config::FlowConfig;
use crate::error::{FlowError, Result};
use crate::io::{Checkpoint, ReadWrite};
use crate::mesh::Mesh;
use std::path::Path;
use std::sync::Arc;

/// Write mesh, state, Reynolds number and control of `flow`
pub(crate) fn save_checkpoint<F: Flow + ?Sized>(flow: &F, path: &Path) -> Result<()> {
    let core = flow.core();
    let cp = Checkpoint::new(
        flow.kind(),
        core.reynolds(),
        flow.control(),
        core.mesh(),
        core.state().as_array().clone(),
    );
    cp.write(path)?;
    tracing::info!(?path, flow = flow.kind().name(), "saved checkpoint");
    Ok(())
}

/// Rebuild a flow of `config.kind` from the checkpoint at `path`.
///
/// The Reynolds number of `config` takes precedence when it is set,
/// otherwise the one stored in the checkpoint is used.
pub(crate) fn restore<T, B>(path: &Path, config: &FlowConfig, build: B) -> Result<T>
where
    T: Flow,
    B: FnOnce(Arc<Mesh>, &FlowConfig) -> Result<T>,
{
    rebuild(&Checkpoint::load(path)?, path, config, build)
}

/// Like [`restore`], but the flow kind is taken from the checkpoint
pub(crate) fn restore_any<T, B>(path: &Path, config: &FlowConfig, build: B) -> Result<T>
where
    T: Flow,
    B: FnOnce(Arc<Mesh>, &FlowConfig) -> Result<T>,
{
    let cp = Checkpoint::load(path)?;
    let mut config = config.clone();
    config.kind = cp.kind;
    rebuild(&cp, path, &config, build)
}

fn rebuild<T, B>(cp: &Checkpoint, path: &Path, config: &FlowConfig, build: B) -> Result<T>
where
    T: Flow,
    B: FnOnce(Arc<Mesh>, &FlowConfig) -> Result<T>,
{
    if cp.kind != config.kind {
        return Err(FlowError::Checkpoint(format!(
            "{:?} holds a {} flow, expected {}",
            path,
            cp.kind.name(),
            config.kind.name()
        )));
    }
    let mut config = config.clone();
    config.reynolds = config.reynolds.or(Some(cp.reynolds));
    let mesh = Arc::new(Mesh::from_data(cp.mesh.clone())?);
    let mut flow = build(mesh, &config)?;
    let q = cp.state()?.clone();
    flow.core_mut()
        .commit_array(q)
        .map_err(|e| FlowError::Checkpoint(format!("{:?}: {}", path, e)))?;
    if !cp.control.is_empty() {
        flow.set_control(&cp.control)
            .map_err(|e| FlowError::Checkpoint(format!("{:?}: {}", path, e)))?;
    }
    tracing::info!(
        ?path,
        flow = config.kind.name(),
        reynolds = flow.reynolds(),
        "restored checkpoint"
    );
    Ok(flow)
}
