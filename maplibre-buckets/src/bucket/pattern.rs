//! Features of patterned layers wait for their images before they are tessellated.

use crate::{
    bucket::{BucketFeature, ImagePositions, PopulateParameters},
    style::{PropertyValue, StyleLayer},
};

/// Whether any of `layers` draws a pattern. Constant patterns are registered as dependencies
/// right away.
pub fn has_pattern(layers: &[StyleLayer], options: &mut PopulateParameters) -> bool {
    let mut has_pattern = false;

    for layer in layers {
        match layer.pattern() {
            Some(PropertyValue::Constant(pattern)) => {
                has_pattern = true;
                options.pattern_dependencies.insert(pattern.clone());
            }
            Some(PropertyValue::Expression(_)) => has_pattern = true,
            None => {}
        }
    }

    has_pattern
}

/// Evaluates the data driven patterns of `layers` for `feature` and registers the images it
/// needs.
pub fn add_pattern_dependencies(
    layers: &[StyleLayer],
    mut feature: BucketFeature,
    options: &mut PopulateParameters,
) -> BucketFeature {
    for layer in layers {
        let Some(pattern @ PropertyValue::Expression(_)) = layer.pattern() else {
            continue;
        };

        if let Some(image) = pattern.evaluate(&feature.properties) {
            options.pattern_dependencies.insert(image.clone());
            feature.patterns.insert(layer.id.clone(), image);
        }
    }
    feature
}

/// Logs patterns of `feature` which are missing from the atlas.
pub fn log_missing_images(feature: &BucketFeature, image_positions: &ImagePositions) {
    for (layer_id, image) in &feature.patterns {
        if !image_positions.contains_key(image) {
            log::debug!("pattern image {image} of layer {layer_id} is not in the image atlas");
        }
    }
}
