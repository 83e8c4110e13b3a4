pub mod icons;
pub mod progress;

pub use progress::{ConsoleNotifier, GenerationUI, StepMark, step_marks};
