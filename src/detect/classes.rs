//! The fixed class vocabulary shared by all detector backends.
//!
//! Backends emit one score per entry of this table, in order. The crowd
//! policy only cares about `PERSON_CLASS_ID`, but counts are kept for
//! every class so consumers see the full scene composition.

/// Index of the "person" class in `CLASS_LABELS`.
pub const PERSON_CLASS_ID: usize = 0;

/// COCO-style 80-class label set.
pub const CLASS_LABELS: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Label for a class id, if the id is in range.
pub fn class_label(class_id: usize) -> Option<&'static str> {
    CLASS_LABELS.get(class_id).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_is_class_zero() {
        assert_eq!(class_label(PERSON_CLASS_ID), Some("person"));
    }

    #[test]
    fn out_of_range_has_no_label() {
        assert_eq!(class_label(CLASS_LABELS.len()), None);
    }
}
