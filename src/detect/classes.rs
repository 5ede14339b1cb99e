//! COCO class table for the object detector.
//!
//! The detector reports label indices into this fixed 81-entry table.
//! Index 0 is the background class and never appears in reported
//! detections.

/// COCO class labels (81 classes, including background).
pub const COCO_CLASSES: [&str; 81] = [
    "__background__",
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

/// Object classes that violate exam policy when visible on camera.
pub const DEFAULT_PROHIBITED_CLASSES: [&str; 3] = ["cell phone", "book", "laptop"];

/// Resolve a detector label index to its class name. Out-of-table indices
/// resolve to `None` rather than panicking on malformed model output.
pub fn class_name(index: usize) -> Option<&'static str> {
    COCO_CLASSES.get(index).copied()
}
