use super::Rgb;

/// A colormap defined by control points over `[0, 1]`, interpolated
/// linearly in RGB between neighbouring stops.
#[derive(Debug, Clone, Copy)]
pub struct Colormap {
    pub name: &'static str,
    stops: &'static [(f32, [u8; 3])],
}

// Kenneth Moreland's smooth cool-warm diverging map, sampled at 33 points.
// https://www.kennethmoreland.com/color-maps/
const COOLWARM_STOPS: [(f32, [u8; 3]); 33] = [
    (0.0, [59, 76, 192]),
    (0.03125, [68, 90, 204]),
    (0.0625, [77, 104, 215]),
    (0.09375, [87, 117, 225]),
    (0.125, [98, 130, 234]),
    (0.15625, [108, 142, 241]),
    (0.1875, [119, 154, 247]),
    (0.21875, [130, 165, 251]),
    (0.25, [141, 176, 254]),
    (0.28125, [152, 185, 255]),
    (0.3125, [163, 194, 255]),
    (0.34375, [174, 201, 253]),
    (0.375, [184, 208, 249]),
    (0.40625, [194, 213, 244]),
    (0.4375, [204, 217, 238]),
    (0.46875, [213, 219, 230]),
    (0.5, [221, 221, 221]),
    (0.53125, [229, 216, 209]),
    (0.5625, [236, 211, 197]),
    (0.59375, [241, 204, 185]),
    (0.625, [245, 196, 173]),
    (0.65625, [247, 187, 160]),
    (0.6875, [247, 177, 148]),
    (0.71875, [247, 166, 135]),
    (0.75, [244, 154, 123]),
    (0.78125, [241, 141, 111]),
    (0.8125, [236, 127, 99]),
    (0.84375, [229, 112, 88]),
    (0.875, [222, 96, 77]),
    (0.90625, [213, 80, 66]),
    (0.9375, [203, 62, 56]),
    (0.96875, [192, 40, 47]),
    (1.0, [180, 4, 38]),
];

pub const COOLWARM: Colormap = Colormap::new("coolwarm", &COOLWARM_STOPS);

impl Colormap {
    /// `stops` are `(position, rgb)` pairs sorted by position, the first at
    /// 0 and the last at 1.
    pub const fn new(name: &'static str, stops: &'static [(f32, [u8; 3])]) -> Self {
        Self { name, stops }
    }

    pub fn stops(&self) -> &'static [(f32, [u8; 3])] {
        self.stops
    }

    /// Color at `x`, clipped to `[0, 1]`. NaN, and any value of a map
    /// without stops, maps to black.
    pub fn map(&self, x: f32) -> Rgb {
        let Some(last) = self.stops.len().checked_sub(1) else {
            return Rgb::new(0., 0., 0.);
        };
        if x.is_nan() {
            return Rgb::new(0., 0., 0.);
        }
        let x = x.clamp(0., 1.);
        let upper = self
            .stops
            .iter()
            .position(|&(pos, _)| pos >= x)
            .unwrap_or(last);
        let (hi_pos, hi) = self.stops[upper];
        if upper == 0 || hi_pos == x {
            return Rgb::from_u8(hi[0], hi[1], hi[2]);
        }
        let (lo_pos, lo) = self.stops[upper - 1];
        let w = (x - lo_pos) / (hi_pos - lo_pos);
        let channel = |i: usize| ((1. - w) * lo[i] as f32 + w * hi[i] as f32) / 255.;
        Rgb::new(channel(0), channel(1), channel(2))
    }

    pub fn min_color(&self) -> Rgb {
        self.map(0.)
    }

    pub fn max_color(&self) -> Rgb {
        self.map(1.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coolwarm_stops() {
        assert_eq!(COOLWARM.map(0.), Rgb::from_u8(59, 76, 192));
        assert_eq!(COOLWARM.map(0.5), Rgb::from_u8(221, 221, 221));
        assert_eq!(COOLWARM.map(1.), Rgb::from_u8(180, 4, 38));
        assert_eq!(COOLWARM.map(-3.), COOLWARM.min_color());
        assert_eq!(COOLWARM.map(7.), COOLWARM.max_color());
        assert_eq!(COOLWARM.map(f32::NAN), Rgb::new(0., 0., 0.));
    }

    #[test]
    fn test_coolwarm_interpolates_between_stops() {
        let mid = COOLWARM.map(0.5 + 0.03125 / 2.);
        let lo = Rgb::from_u8(221, 221, 221);
        let hi = Rgb::from_u8(229, 216, 209);
        assert!((mid.r - (lo.r + hi.r) / 2.).abs() < 1e-6);
        assert!((mid.g - (lo.g + hi.g) / 2.).abs() < 1e-6);
        assert!((mid.b - (lo.b + hi.b) / 2.).abs() < 1e-6);
        // cool side is blue dominated, warm side red dominated
        let cool = COOLWARM.map(0.2);
        let warm = COOLWARM.map(0.8);
        assert!(cool.b > cool.r);
        assert!(warm.r > warm.b);
    }

    #[test]
    fn test_custom_and_empty_maps() {
        const GRAY: Colormap = Colormap::new("gray", &[(0.0, [0, 0, 0]), (1.0, [255, 255, 255])]);
        assert_eq!(GRAY.stops().len(), 2);
        assert_eq!(GRAY.map(0.), Rgb::new(0., 0., 0.));
        assert_eq!(GRAY.map(1.), Rgb::new(1., 1., 1.));
        assert!((GRAY.map(0.25).r - 0.25).abs() < 1e-6);

        let empty = Colormap::new("empty", &[]);
        assert_eq!(empty.map(0.5), Rgb::new(0., 0., 0.));
        assert_eq!(empty.max_color(), Rgb::new(0., 0., 0.));
    }
}
