//! External collaborators: work sources, extraction, language services,
//! evaluation and feedback sinks

pub mod evaluator;
pub mod simulated;
pub mod traits;

pub use evaluator::AgreementEvaluator;
pub use simulated::{
    SimulatedExtractor, SimulatedLanguageService, SimulatedWorkSource, TracingFeedbackSink,
};
pub use traits::{
    Extractor, FeedbackEvent, FeedbackSink, NaturalLanguageService, PerformanceEvaluator,
    WorkSource,
};

#[cfg(test)]
pub use traits::{
    MockExtractor, MockFeedbackSink, MockNaturalLanguageService, MockPerformanceEvaluator,
    MockWorkSource,
};
