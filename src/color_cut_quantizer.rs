use crate::{
    color::{Candidate, Rgb24},
    error::Result,
    quantizer::Quantizer,
};
use std::collections::{BinaryHeap, HashMap};

const QUANTIZE_WORD_WIDTH: u32 = 5;
const QUANTIZE_WORD_MAX: u8 = (1 << QUANTIZE_WORD_WIDTH) - 1;

type Rgb5 = (u8, u8, u8);

/// The built-in quantizer: median cut over a 5-bit-per-channel histogram.
///
/// Every resulting cluster is scored by its population, the number of input pixels it covers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorCutQuantizer;

struct Vbox<'a> {
    colors: &'a mut [(Rgb5, u32)],
    population: u32,
    red_range: (u8, u8),
    green_range: (u8, u8),
    blue_range: (u8, u8),
}

enum Component {
    Red,
    Green,
    Blue,
}

impl Quantizer for ColorCutQuantizer {
    fn quantize(&self, rgb: &[u8], max_clusters: usize) -> Result<Vec<Candidate>> {
        let mut clusters = quantized_colors(rgb, max_clusters.max(1));

        // highest population first, then by color so equal populations come out in a fixed order
        clusters.sort_by(|(lhs, lhs_pop), (rhs, rhs_pop)| rhs_pop.cmp(lhs_pop).then(lhs.cmp(rhs)));

        Ok(clusters
            .into_iter()
            .map(|(color, population)| Candidate::new(color, population as f32))
            .collect())
    }
}

fn quantized_colors(rgb: &[u8], max_colors: usize) -> Vec<(Rgb24, u32)> {
    // begin by generating a histogram of quantized pixel values
    let mut hist: HashMap<Rgb5, u32> = HashMap::new();
    for pixel in rgb.chunks_exact(3) {
        let key = (
            modify_width(pixel[0], 8, QUANTIZE_WORD_WIDTH),
            modify_width(pixel[1], 8, QUANTIZE_WORD_WIDTH),
            modify_width(pixel[2], 8, QUANTIZE_WORD_WIDTH),
        );
        *hist.entry(key).or_insert(0) += 1;
    }

    // the colors have to be ordered at this point, and tuples order red first
    let mut colors = hist.into_iter().collect::<Vec<_>>();
    colors.sort_unstable_by_key(|&(color, _)| color);

    if colors.len() <= max_colors {
        // there are less colors than requested, no need for further processing
        colors
            .into_iter()
            .map(|(color, count)| (widen(color), count))
            .collect()
    } else {
        quantize_pixels(&mut colors, max_colors)
    }
}

fn quantize_pixels(colors: &mut [(Rgb5, u32)], max_colors: usize) -> Vec<(Rgb24, u32)> {
    // the queue always pops the largest Vbox by volume first
    let mut pq = BinaryHeap::with_capacity(max_colors);
    pq.push(Vbox::new(colors));

    split_boxes(&mut pq, max_colors);

    pq.iter().map(Vbox::average_color).collect()
}

fn split_boxes(pq: &mut BinaryHeap<Vbox<'_>>, max_colors: usize) {
    while pq.len() < max_colors {
        match pq.pop() {
            Some(vbox) if vbox.can_split() => {
                let (left, right) = vbox.split_box();

                pq.push(left);
                pq.push(right);
            }
            Some(vbox) => {
                // the largest box is a single color, so nothing else can be split meaningfully
                pq.push(vbox);
                return;
            }
            None => return,
        }
    }
}

impl<'a> Vbox<'a> {
    fn new(colors: &'a mut [(Rgb5, u32)]) -> Self {
        // compute the boundaries of the Vbox to tightly fit around the colors within it
        let mut population = 0;
        let (mut min_red, mut max_red) = (QUANTIZE_WORD_MAX, 0);
        let (mut min_green, mut max_green) = (QUANTIZE_WORD_MAX, 0);
        let (mut min_blue, mut max_blue) = (QUANTIZE_WORD_MAX, 0);

        for &((r, g, b), count) in colors.iter() {
            population += count;

            min_red = min_red.min(r);
            max_red = max_red.max(r);
            min_green = min_green.min(g);
            max_green = max_green.max(g);
            min_blue = min_blue.min(b);
            max_blue = max_blue.max(b);
        }

        Self {
            colors,
            population,
            red_range: (min_red, max_red),
            green_range: (min_green, max_green),
            blue_range: (min_blue, max_blue),
        }
    }

    fn volume(&self) -> u32 {
        (self.red_range.1 - self.red_range.0 + 1) as u32
            * (self.green_range.1 - self.green_range.0 + 1) as u32
            * (self.blue_range.1 - self.blue_range.0 + 1) as u32
    }

    fn split_box(mut self) -> (Vbox<'a>, Vbox<'a>) {
        // split the Vbox at the population midpoint of its largest color dimension
        self.sort_colors_by_longest_dimension();

        let split_point = self.find_split_point();
        let (old, new) = self.colors.split_at_mut(split_point);

        (Vbox::new(old), Vbox::new(new))
    }

    fn sort_colors_by_longest_dimension(&mut self) {
        match self.longest_dimension() {
            Component::Red => self.colors.sort_by_key(|&((r, g, b), _)| (r, g, b)),
            Component::Green => self.colors.sort_by_key(|&((r, g, b), _)| (g, r, b)),
            Component::Blue => self.colors.sort_by_key(|&((r, g, b), _)| (b, g, r)),
        }
    }

    fn find_split_point(&self) -> usize {
        let midpoint = self.population / 2;
        let mut pop = 0;

        for (i, (_, count)) in self.colors.iter().enumerate() {
            pop += count;

            if pop >= midpoint {
                // a split at 0 or at the end would leave one side empty
                return i.clamp(1, self.colors.len() - 1);
            }
        }

        1
    }

    fn can_split(&self) -> bool {
        self.colors.len() > 1
    }

    fn longest_dimension(&self) -> Component {
        let red_length = self.red_range.1 - self.red_range.0;
        let green_length = self.green_range.1 - self.green_range.0;
        let blue_length = self.blue_range.1 - self.blue_range.0;

        if red_length >= green_length && red_length >= blue_length {
            Component::Red
        } else if green_length >= red_length && green_length >= blue_length {
            Component::Green
        } else {
            Component::Blue
        }
    }

    fn average_color(&self) -> (Rgb24, u32) {
        let (pop, red_sum, green_sum, blue_sum) = self.colors.iter().fold(
            (0u64, 0u64, 0u64, 0u64),
            |(pop, red_sum, green_sum, blue_sum), &((r, g, b), count)| {
                let count = u64::from(count);
                (
                    pop + count,
                    red_sum + u64::from(r) * count,
                    green_sum + u64::from(g) * count,
                    blue_sum + u64::from(b) * count,
                )
            },
        );

        let mean = |sum: u64| (sum as f32 / pop.max(1) as f32).round() as u8;

        (widen((mean(red_sum), mean(green_sum), mean(blue_sum))), pop as u32)
    }
}

impl Eq for Vbox<'_> {}
impl PartialEq for Vbox<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.volume() == other.volume()
    }
}

impl Ord for Vbox<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.volume().cmp(&other.volume())
    }
}

impl PartialOrd for Vbox<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

fn widen((r, g, b): Rgb5) -> Rgb24 {
    Rgb24::new(
        modify_width(r, QUANTIZE_WORD_WIDTH, 8),
        modify_width(g, QUANTIZE_WORD_WIDTH, 8),
        modify_width(b, QUANTIZE_WORD_WIDTH, 8),
    )
}

fn modify_width(value: u8, current_width: u32, target_width: u32) -> u8 {
    if target_width > current_width {
        value.wrapping_shl(target_width - current_width)
    } else {
        value.wrapping_shr(current_width - target_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixels(colors: &[((u8, u8, u8), usize)]) -> Vec<u8> {
        colors
            .iter()
            .flat_map(|&((r, g, b), n)| std::iter::repeat([r, g, b]).take(n).flatten())
            .collect()
    }

    #[test]
    fn few_colors_come_back_as_is_ranked_by_population() {
        let rgb = pixels(&[((255, 0, 0), 5), ((0, 0, 255), 9), ((0, 255, 0), 2)]);
        let candidates = ColorCutQuantizer.quantize(&rgb, 16).unwrap();

        let colors: Vec<_> = candidates.iter().map(|c| c.color()).collect();
        assert_eq!(colors, vec![Rgb24::new(0, 0, 248), Rgb24::new(248, 0, 0), Rgb24::new(0, 248, 0)]);

        let scores: Vec<_> = candidates.iter().map(|c| c.score()).collect();
        assert_eq!(scores, vec![9.0, 5.0, 2.0]);
    }

    #[test]
    fn never_returns_more_than_requested() {
        let rgb: Vec<u8> = (0..=255u8).flat_map(|v| [v, 255 - v, v / 2]).collect();
        let candidates = ColorCutQuantizer.quantize(&rgb, 8).unwrap();

        assert_eq!(candidates.len(), 8);
        assert!(candidates.windows(2).all(|w| w[0].score() >= w[1].score()));

        let total: f32 = candidates.iter().map(|c| c.score()).sum();
        assert_eq!(total, 256.0);
    }

    #[test]
    fn empty_input_has_no_clusters() {
        assert!(ColorCutQuantizer.quantize(&[], 16).unwrap().is_empty());
    }

    #[test]
    fn splits_separate_distant_colors() {
        let rgb = pixels(&[((250, 10, 10), 50), ((245, 5, 12), 50), ((10, 10, 250), 40), ((12, 8, 240), 40)]);
        let candidates = ColorCutQuantizer.quantize(&rgb, 2).unwrap();

        assert_eq!(candidates.len(), 2);

        let (r, _, b) = candidates[0].color().rgb();
        assert!(r > 200 && b < 40);
        assert_eq!(candidates[0].score(), 100.0);

        let (r, _, b) = candidates[1].color().rgb();
        assert!(b > 200 && r < 40);
    }
}
