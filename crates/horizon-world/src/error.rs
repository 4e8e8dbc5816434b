use std::fmt;

use horizon_chunk::HeightFieldError;
use horizon_geom::ChunkPos;

/// Contract violations reported by the world and its chunks. Returned before
/// anything is mutated.
#[derive(Debug)]
pub enum WorldError {
    ChunkExists(ChunkPos),
    /// The chunk's height field is not `terrain.chunk_width` wide.
    WidthMismatch {
        pos: ChunkPos,
        expected: usize,
        actual: usize,
    },
    NoSuchChunk(ChunkPos),
    ViewerAlreadySet,
    WaterAlreadySet,
    WaterBeforeViewer,
    /// `show` was asked for a LOD the chunk has not built.
    LodNotReady { pos: ChunkPos, lod: u8 },
    /// A different LOD is still being built for this chunk.
    LodBusy {
        pos: ChunkPos,
        requested: u8,
        in_flight: u8,
    },
    InvalidConfig(&'static str),
    HeightField(HeightFieldError),
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldError::ChunkExists(p) => write!(f, "chunk {} already exists", p),
            WorldError::WidthMismatch {
                pos,
                expected,
                actual,
            } => write!(
                f,
                "chunk {} is {} corners wide; the world uses {}",
                pos, actual, expected
            ),
            WorldError::NoSuchChunk(p) => write!(f, "no chunk at {}", p),
            WorldError::ViewerAlreadySet => write!(f, "viewer has already been set up"),
            WorldError::WaterAlreadySet => write!(f, "water has already been set up"),
            WorldError::WaterBeforeViewer => write!(f, "water needs a viewer first"),
            WorldError::LodNotReady { pos, lod } => {
                write!(f, "chunk {} has no LOD {} built", pos, lod)
            }
            WorldError::LodBusy {
                pos,
                requested,
                in_flight,
            } => write!(
                f,
                "chunk {} is building LOD {}; LOD {} rejected",
                pos, in_flight, requested
            ),
            WorldError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            WorldError::HeightField(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for WorldError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorldError::HeightField(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HeightFieldError> for WorldError {
    fn from(e: HeightFieldError) -> Self {
        WorldError::HeightField(e)
    }
}
