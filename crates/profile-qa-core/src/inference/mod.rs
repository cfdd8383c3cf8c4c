//! ML inference using Candle.
//!
//! Provides the models behind the expression classifier:
//! - `BlazeFace` (face detection)
//! - a five-class expression CNN over face crops

mod blazeface;
mod classifier;
mod device;
mod expression_net;
mod loader;
mod utils;

pub use blazeface::{BlazeFace, Detection, INPUT_SIZE};
pub use classifier::{load_classifier, CandleExpressionClassifier, ClassifierConfig};
pub use device::select_device;
pub use expression_net::{ExpressionNet, FACE_SIZE, LABELS};
pub use loader::{load_safetensors, LazyModel};
pub(crate) use utils::{sigmoid, softmax};
