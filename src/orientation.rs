//! Orientation bookkeeping and preview size selection.

/// Quarter-turn rotation applied to a frame before classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Quarter turns from a raw degree value: `degrees / 90` rounded toward
    /// zero, then reduced modulo 4. Negative values wrap (`-90` is `Deg270`).
    pub fn from_degrees(degrees: i32) -> Self {
        if degrees % 90 != 0 {
            log::warn!(
                "rotation of {} degrees is not a multiple of 90; truncating to {}",
                degrees,
                degrees / 90 * 90
            );
        }
        Self::from_quarter_turns(degrees / 90)
    }

    pub fn from_quarter_turns(turns: i32) -> Self {
        match turns.rem_euclid(4) {
            0 => Rotation::Deg0,
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            _ => Rotation::Deg270,
        }
    }

    pub fn quarter_turns(self) -> u8 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 1,
            Rotation::Deg180 => 2,
            Rotation::Deg270 => 3,
        }
    }

    pub fn degrees(self) -> i32 {
        self.quarter_turns() as i32 * 90
    }
}

/// Rotation the classifier input needs: sensor orientation minus display rotation.
pub fn effective_rotation(sensor_orientation: i32, display_rotation: i32) -> Rotation {
    Rotation::from_degrees(sensor_orientation - display_rotation)
}

/// Width x height pair offered by a camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Pick a capture size for a classifier input of `width` x `height`.
///
/// An exact match wins. Otherwise the smallest choice whose sides both reach
/// `min(width, height)`; failing that, the largest of the rest.
pub fn choose_optimal_size(choices: &[Size], width: u32, height: u32) -> Option<Size> {
    let desired = Size::new(width, height);
    if choices.contains(&desired) {
        return Some(desired);
    }

    let min_side = width.min(height);
    let (big_enough, too_small): (Vec<Size>, Vec<Size>) = choices
        .iter()
        .copied()
        .partition(|size| size.width >= min_side && size.height >= min_side);

    big_enough
        .into_iter()
        .min_by_key(|size| size.area())
        .or_else(|| too_small.into_iter().max_by_key(|size| size.area()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_degrees_normalizes_quarter_turns() {
        assert_eq!(Rotation::from_degrees(0), Rotation::Deg0);
        assert_eq!(Rotation::from_degrees(90), Rotation::Deg90);
        assert_eq!(Rotation::from_degrees(450), Rotation::Deg90);
        assert_eq!(Rotation::from_degrees(-90), Rotation::Deg270);
        assert_eq!(Rotation::from_degrees(-270), Rotation::Deg90);
    }

    #[test]
    fn from_degrees_truncates_toward_zero() {
        assert_eq!(Rotation::from_degrees(179), Rotation::Deg90);
        assert_eq!(Rotation::from_degrees(89), Rotation::Deg0);
        assert_eq!(Rotation::from_degrees(-100), Rotation::Deg270);
    }

    #[test]
    fn effective_rotation_subtracts_display() {
        assert_eq!(effective_rotation(90, 0), Rotation::Deg90);
        assert_eq!(effective_rotation(90, 90), Rotation::Deg0);
        assert_eq!(effective_rotation(90, 270), Rotation::Deg180);
        assert_eq!(effective_rotation(270, 90), Rotation::Deg180);
        assert_eq!(effective_rotation(0, 90), Rotation::Deg270);
    }

    #[test]
    fn optimal_size_prefers_exact_then_smallest_big_enough() {
        let choices = [
            Size::new(1920, 1080),
            Size::new(640, 480),
            Size::new(320, 240),
            Size::new(224, 224),
        ];
        assert_eq!(
            choose_optimal_size(&choices, 224, 224),
            Some(Size::new(224, 224))
        );
        assert_eq!(
            choose_optimal_size(&choices, 300, 300),
            Some(Size::new(640, 480))
        );
    }

    #[test]
    fn optimal_size_falls_back_to_largest_small_choice() {
        let choices = [Size::new(160, 120), Size::new(320, 240)];
        assert_eq!(
            choose_optimal_size(&choices, 500, 500),
            Some(Size::new(320, 240))
        );
        assert_eq!(choose_optimal_size(&[], 224, 224), None);
    }
}
