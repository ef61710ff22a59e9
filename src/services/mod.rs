pub mod path_store;
pub mod stroke_capture;
pub mod stroke_renderer;

pub use path_store::{answer_key, question_id_from_key, PathStore};
pub use stroke_capture::{CaptureState, OffsetPolicy, PointerEvent, StrokeCapture, StrokeEvent, TouchPoint};
pub use stroke_renderer::StrokeRenderer;
