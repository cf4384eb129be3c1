use crate::config::{PromptEntryConfig, PromptVersionConfig};

fn version(version: &str, text: &str, extraction_method: &str, active: bool) -> PromptVersionConfig {
    PromptVersionConfig {
        version: version.to_string(),
        text: text.to_string(),
        extraction_method: extraction_method.to_string(),
        regex_pattern: None,
        description_pattern: None,
        token_pair: None,
        requires_json: false,
        input_type: None,
        output_type: None,
        active,
    }
}

fn entry(id: &str, description: &str, versions: Vec<PromptVersionConfig>) -> PromptEntryConfig {
    PromptEntryConfig {
        id: id.to_string(),
        description: Some(description.to_string()),
        prompt_type: None,
        chain_order: Vec::new(),
        versions,
    }
}

pub fn builtin_prompts() -> Vec<PromptEntryConfig> {
    vec![
        entry(
            "prompt1",
            "Basic quality rating prompt",
            vec![
                version("v1", "Rate the quality of the image.", "direct_output", true),
                version(
                    "v2",
                    "Score the quality of the image from 1 to 5, with 1 as lowest and 5 as highest.",
                    "direct_output",
                    false,
                ),
                PromptVersionConfig {
                    token_pair: Some(("good".to_string(), "poor".to_string())),
                    ..version("v3", "Rate the quality of the image.", "softmax_based", true)
                },
            ],
        ),
        entry(
            "prompt2",
            "Detailed quality assessment prompt",
            vec![
                PromptVersionConfig {
                    regex_pattern: Some(r"Score:\s*(\d+)".to_string()),
                    ..version(
                        "v1",
                        "For the given image, please assign a perceptual quality score in terms \
                         of structure and texture preservation, color and luminance reproduction, \
                         noise, contrast, sharpness, and any other low-level distortions. The score \
                         must range from 0 to 100, with a higher score denoting better image quality. \
                         Your response must only include a score to summarize its visual quality of \
                         the given image. The response format should be: Score: [a score].",
                        "direct_output",
                        true,
                    )
                },
                PromptVersionConfig {
                    regex_pattern: Some(r"Score:\s*(\d+)".to_string()),
                    description_pattern: Some(r"Description:\s*(.+?)\.\s*Score:".to_string()),
                    ..version(
                        "v2",
                        "For the given image, please first detail its perceptual quality in terms \
                         of structure and texture preservation, color and luminance reproduction, \
                         noise, contrast, sharpness, and any other low-level distortions. Then, \
                         based on the perceptual analysis of the given image, assign a quality \
                         score to the given image. The score must range from 0 to 100, with a \
                         higher score denoting better image quality. Your response must only \
                         include a concise description regarding the perceptual quality of the \
                         given image, and a score to summarize its perceptual quality of the given \
                         image, while well aligning with the given description. The response format \
                         should be: Description: [a concise description]. Score: [a score].",
                        "direct_output",
                        true,
                    )
                },
            ],
        ),
        PromptEntryConfig {
            id: "prompt3".to_string(),
            description: Some("Compositional chain-of-thought prompt".to_string()),
            prompt_type: Some("chain".to_string()),
            chain_order: vec!["v1".to_string(), "v2".to_string()],
            versions: vec![
                PromptVersionConfig {
                    requires_json: true,
                    output_type: Some("scene_graph".to_string()),
                    ..version(
                        "v1",
                        "Evaluate the quality of the image as follows: (1) Bad (2) Poor (3) Fair \
                         (4) Good (5) Excellent\n\nFor the provided image and its associated \
                         question, generate a scene graph in JSON format that includes the \
                         following:\n1. Objects that are relevant to answering the question\n2. \
                         Object attributes that are relevant to answering the question\n3. Object \
                         relationships that are relevant to answering the question\n\nScene Graph:",
                        "ccot_direct_guided",
                        true,
                    )
                },
                PromptVersionConfig {
                    requires_json: true,
                    input_type: Some("scene_graph".to_string()),
                    output_type: Some("score".to_string()),
                    ..version(
                        "v2",
                        "Use the image and following scene graph as context and answer the \
                         following question:\n\n{scene_graph}\n\nEvaluate the quality of the image \
                         as follows: (1) Bad (2) Poor (3) Fair (4) Good (5) Excellent\n\nAnswer \
                         with the option's digit from the given choices directly.",
                        "ccot_direct_guided",
                        true,
                    )
                },
            ],
        },
        entry(
            "prompt4",
            "System-role quality assessment prompt",
            vec![version(
                "v1",
                "You are a helpful assistant to help me evaluate the quality of the image. You \
                 will be given standards about each quality level. The quality standard is listed \
                 as follows: 5: Excellent, 4: Good, 3: Fair, 2: Bad, 1: Poor. Please evaluate the \
                 quality of the image and score in [1,2,3,4,5]. Only tell me the number.",
                "direct_output",
                true,
            )],
        ),
        entry(
            "prompt5",
            "Detailed distortion analysis prompt",
            vec![version(
                "v1",
                "Based on the image, answer the following questions:\n\n1. Is the blurriness of \
                 the main object of the image noticeable?\n2. Is the blurriness of the background \
                 noticeable?\n3. Is the color distortion of the main object of the image \
                 noticeable?\n4. Is the color distortion of the background noticeable?\n5. Is the \
                 brightness distortion of the main object of the image noticeable?\n6. Is the \
                 brightness distortion of the background noticeable?\n7. Is the compression \
                 artifact of the main object of the image noticeable?\n8. Is the compression \
                 artifact of the background noticeable?\n9. Is the noise of the main object of \
                 the image noticeable?\n10. Is the noise of the background noticeable?\n11. Are \
                 the spatial distortions of the main object of the image noticeable?\n12. Are the \
                 spatial distortions of the background noticeable?",
                "direct_output",
                false,
            )],
        ),
        entry(
            "prompt6",
            "Distortion identification prompt",
            vec![
                version(
                    "v1",
                    "Based on the image, choose one of these distortions as the most noticeable \
                     in the image, and explain why: Blur distortion, Noise distortion, Compression \
                     distortion, Color distortion, Brightness distortion, Spatial distortions.",
                    "direct_output",
                    false,
                ),
                version(
                    "v2",
                    "What type of distortion is the most prominent in this image.",
                    "direct_output",
                    false,
                ),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_lists_six_prompt_ids() {
        let entries = builtin_prompts();
        let ids: Vec<&str> = entries.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["prompt1", "prompt2", "prompt3", "prompt4", "prompt5", "prompt6"]
        );
    }

    #[test]
    fn chain_prompt_declares_order_and_wiring_tags() {
        let entries = builtin_prompts();
        let chain = entries.iter().find(|entry| entry.id == "prompt3").unwrap();
        assert_eq!(chain.prompt_type.as_deref(), Some("chain"));
        assert_eq!(chain.chain_order, vec!["v1", "v2"]);

        let first = &chain.versions[0];
        let last = &chain.versions[1];
        assert_eq!(first.output_type.as_deref(), Some("scene_graph"));
        assert_eq!(last.input_type.as_deref(), Some("scene_graph"));
        assert!(last.text.contains("{scene_graph}"));
    }

    #[test]
    fn regex_prompts_carry_capture_patterns() {
        let entries = builtin_prompts();
        let detailed = entries.iter().find(|entry| entry.id == "prompt2").unwrap();
        assert!(detailed
            .versions
            .iter()
            .all(|v| v.regex_pattern.as_deref() == Some(r"Score:\s*(\d+)")));
        assert!(detailed.versions[1].description_pattern.is_some());
    }
}
