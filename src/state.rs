use std::sync::Arc;

use crate::pipeline::AssessmentPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AssessmentPipeline>,
    pub reference_images: usize,
}

impl AppState {
    pub fn new(pipeline: AssessmentPipeline, reference_images: usize) -> Self {
        AppState {
            pipeline: Arc::new(pipeline),
            reference_images,
        }
    }
}
