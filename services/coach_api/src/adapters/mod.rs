pub mod plan_llm;
pub mod vision_llm;

pub use plan_llm::OpenAiPlanAdapter;
pub use vision_llm::OpenAiWorkoutVisionAdapter;
