use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::storage_keys::{results_prefix, source_images_prefix};

/// Token the fine-tuning step binds to the uploaded subject.
pub const SUBJECT_TOKEN: &str = "sks";

pub const TRAINING_STEPS: u32 = 800;
pub const LEARNING_RATE: f64 = 1e-6;
pub const INFERENCE_STEPS: u32 = 50;
pub const GUIDANCE_SCALE: f64 = 7.5;
pub const SAMPLES_PER_PROMPT: u32 = 20;
pub const IMAGE_SIZE: u32 = 512;
pub const SEED: u64 = 52_362;

pub const NEGATIVE_PROMPT: &str =
    "lowres, blurry, deformed, bad anatomy, extra limbs, watermark, text, signature";

/// Request body submitted to the asynchronous GPU job endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub input: JobInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInput {
    pub collection_id: String,
    /// Lets the job report progress back through `/updateCollectionStatus`.
    pub secret_key: String,
    pub animal_type: String,
    pub source_prefix: String,
    pub results_prefix: String,
    pub instance_prompt: String,
    pub class_prompt: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub training_steps: u32,
    pub learning_rate: f64,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub num_samples: u32,
    pub width: u32,
    pub height: u32,
    pub seed: u64,
}

impl JobDescriptor {
    pub fn for_collection(collection: &Collection) -> Self {
        let animal_type = collection.animal_type.trim().to_lowercase();
        Self {
            input: JobInput {
                collection_id: collection.collection_id.clone(),
                secret_key: collection.secret_key.clone(),
                source_prefix: source_images_prefix(&collection.collection_id),
                results_prefix: results_prefix(&collection.collection_id),
                instance_prompt: subject_prompt(&animal_type),
                class_prompt: format!("a photo of {animal_type}"),
                prompt: subject_prompt(&animal_type),
                negative_prompt: NEGATIVE_PROMPT.to_string(),
                training_steps: TRAINING_STEPS,
                learning_rate: LEARNING_RATE,
                num_inference_steps: INFERENCE_STEPS,
                guidance_scale: GUIDANCE_SCALE,
                num_samples: SAMPLES_PER_PROMPT,
                width: IMAGE_SIZE,
                height: IMAGE_SIZE,
                seed: SEED,
                animal_type,
            },
        }
    }
}

pub fn subject_prompt(animal_type: &str) -> String {
    format!("a photo of {SUBJECT_TOKEN} {animal_type}")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn descriptor_carries_collection_specific_fields() {
        let collection = Collection::new("c-9", "a@b.com", "Mittens", " Cat ", "k9k9k9", Utc::now());
        let descriptor = JobDescriptor::for_collection(&collection);

        assert_eq!(descriptor.input.collection_id, "c-9");
        assert_eq!(descriptor.input.secret_key, "k9k9k9");
        assert_eq!(descriptor.input.animal_type, "cat");
        assert_eq!(descriptor.input.prompt, "a photo of sks cat");
        assert_eq!(descriptor.input.class_prompt, "a photo of cat");
        assert_eq!(descriptor.input.source_prefix, "c-9/sks/");
        assert_eq!(descriptor.input.results_prefix, "c-9/results/");
    }

    #[test]
    fn descriptor_serializes_under_input_key() {
        let collection = Collection::new("c-9", "a@b.com", "Rex", "dog", "k9k9k9", Utc::now());
        let value = serde_json::to_value(JobDescriptor::for_collection(&collection))
            .expect("descriptor serializes");

        assert_eq!(value["input"]["num_inference_steps"], INFERENCE_STEPS);
        assert_eq!(value["input"]["width"], IMAGE_SIZE);
    }
}
