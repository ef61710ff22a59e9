pub mod path_record;
pub mod status;
pub mod stroke;
pub mod word_set;

pub use path_record::{QuestionId, QuestionPathSet, RectPathRecord, SavedPaths, RECT_COUNT};
pub use status::{RecognitionStatus, WordCheckStatus};
pub use stroke::{Modality, Path, Point, Stroke};
pub use word_set::{WordAnswer, WordSet, WordSetList, WORD_SET_LIST_KEY};
