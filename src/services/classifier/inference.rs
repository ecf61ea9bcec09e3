use crate::error::{AppError, ErrorKind};
use crate::services::classifier::model_manager::OrtModel;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use ort::value::Value;

/// Runs one forward pass over a batch-of-one image tensor.
pub trait Predictor: Send + Sync {
    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>, AppError>;
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, AppError> {
    image::load_from_memory(bytes).map_err(|e| {
        AppError::new(ErrorKind::Decode, format!("Failed to decode image: {}", e))
    })
}

/// Decode, bilinear-resize to `size`×`size` and lay out as NHWC `(1, size, size, 3)`.
///
/// Channel values stay in 0..=255; the model rescales internally.
pub fn preprocess_bytes(bytes: &[u8], size: u32) -> Result<Array4<f32>, AppError> {
    let img = decode_image(bytes)?;
    preprocess_image(&img, size)
}

pub fn preprocess_image(img: &DynamicImage, size: u32) -> Result<Array4<f32>, AppError> {
    let resized = img.resize_exact(size, size, FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let data: Vec<f32> = rgb.into_raw().into_iter().map(|v| v as f32).collect();

    Array4::from_shape_vec((1, size as usize, size as usize, 3), data).map_err(|e| {
        AppError::new(ErrorKind::Decode, format!("Failed to create tensor: {}", e))
    })
}

pub fn run_inference_with_model(model: &mut OrtModel, input: Array4<f32>) -> Result<Vec<f32>, AppError> {
    let input_name = model.inputs()[0].name().to_string();

    let input_tensor = Value::from_array(input).map_err(|e| {
        AppError::new(ErrorKind::Inference, format!("Failed to create tensor value: {}", e))
    })?;

    let outputs = model
        .run(ort::inputs![input_name.as_str() => input_tensor])
        .map_err(|e| AppError::new(ErrorKind::Inference, format!("Inference failed: {}", e)))?;

    let output_value = outputs
        .values()
        .next()
        .ok_or_else(|| AppError::new(ErrorKind::Inference, "Model produced no outputs"))?;

    let (_, data) = output_value.try_extract_tensor::<f32>().map_err(|e| {
        AppError::new(ErrorKind::Inference, format!("Failed to extract output tensor: {}", e))
    })?;

    Ok(data.to_vec())
}

/// Index of the largest score; the first one wins a tie.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ if v.is_nan() => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max_logit = scores.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_sum: f32 = scores.iter().map(|&x| (x - max_logit).exp()).sum();
    scores
        .iter()
        .map(|&x| (x - max_logit).exp() / exp_sum)
        .collect()
}
