pub mod engine;
pub mod raster_surface;
pub mod storage;
pub mod surface;

pub use engine::{EngineFactory, RecognitionEngine, RecognitionProfile, RecognizeOptions, RecognizedPage};
pub use raster_surface::RasterSurface;
pub use storage::{FileStorage, MemoryStorage, Storage, EMPTY_VALUE};
pub use surface::{
    page_offset, FixedLayout, LineCap, LineJoin, LineStyle, Surface, SurfaceImage, SurfaceLayout,
    Transform,
};
