//! Quadrature rules in barycentric coordinates
//!
//! Weights are normalized to sum to one; multiply by the cell area or edge
//! length to integrate.

/// Seven point rule, exact for polynomials of degree 5 on triangles
pub const TRIANGLE_DEG5: [([f64; 3], f64); 7] = [
    ([1. / 3., 1. / 3., 1. / 3.], 0.225),
    (
        [0.059_715_871_789_770, 0.470_142_064_105_115, 0.470_142_064_105_115],
        0.132_394_152_788_506,
    ),
    (
        [0.470_142_064_105_115, 0.059_715_871_789_770, 0.470_142_064_105_115],
        0.132_394_152_788_506,
    ),
    (
        [0.470_142_064_105_115, 0.470_142_064_105_115, 0.059_715_871_789_770],
        0.132_394_152_788_506,
    ),
    (
        [0.797_426_985_353_087, 0.101_286_507_323_456, 0.101_286_507_323_456],
        0.125_939_180_544_827,
    ),
    (
        [0.101_286_507_323_456, 0.797_426_985_353_087, 0.101_286_507_323_456],
        0.125_939_180_544_827,
    ),
    (
        [0.101_286_507_323_456, 0.101_286_507_323_456, 0.797_426_985_353_087],
        0.125_939_180_544_827,
    ),
];

/// Three point Gauss rule on `[0, 1]`, exact for degree 5
pub const LINE_GAUSS3: [(f64, f64); 3] = [
    (0.112_701_665_379_258_3, 5. / 18.),
    (0.5, 8. / 18.),
    (0.887_298_334_620_741_7, 5. / 18.),
];
