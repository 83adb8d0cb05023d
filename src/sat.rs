use image::GrayImage;
use nanorand::{Rng, WyRand};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// Which pixels are taken, by the mask or by words already placed, with a
/// summed-area table over them for constant time box queries.
pub struct Occupancy {
    width: usize,
    height: usize,
    cells: Vec<u32>,
    table: Vec<u32>,
}

impl Occupancy {
    /// `blocked` is row-major, non-zero where nothing may be drawn.
    pub fn new(width: u32, height: u32, blocked: Vec<u32>) -> Self {
        let (width, height) = (width as usize, height as usize);
        debug_assert_eq!(blocked.len(), width * height);

        let cells = blocked.into_iter().map(|cell| u32::from(cell != 0)).collect();
        let mut occupancy = Occupancy {
            width,
            height,
            cells,
            table: vec![0; (width + 1) * (height + 1)],
        };
        to_summed_area_table(&occupancy.cells, &mut occupancy.table, width, 0);
        occupancy
    }

    /// True when no cell in `[x, x + width) x [y, y + height)` is taken.
    pub fn region_is_empty(&self, x: usize, y: usize, width: usize, height: usize) -> bool {
        if x + width > self.width || y + height > self.height {
            return false;
        }

        let stride = self.width + 1;
        let tl = self.table[y * stride + x];
        let tr = self.table[y * stride + x + width];
        let bl = self.table[(y + height) * stride + x];
        let br = self.table[(y + height) * stride + x + width];

        br + tl == tr + bl
    }

    /// 在图片寻找位置写字
    ///
    /// Picks uniformly among every free position for `rect`.
    pub fn find_space_for_rect(&self, rect: &Rect, rng: &mut WyRand) -> Option<Point> {
        let (rect_width, rect_height) = (rect.width as usize, rect.height as usize);
        if rect_width == 0 || rect_height == 0 {
            return None;
        }
        if rect_width > self.width || rect_height > self.height {
            return None;
        }

        let max_x = self.width - rect_width;
        let max_y = self.height - rect_height;

        let mut available_points: u32 = 0;
        let mut random_point = None;

        for y in 0..=max_y {
            for x in 0..=max_x {
                if self.region_is_empty(x, y, rect_width, rect_height) {
                    let random_num = rng.generate_range(0..=available_points);
                    if random_num == available_points {
                        random_point = Some(Point {
                            x: x as u32,
                            y: y as u32,
                        });
                    }
                    available_points += 1;
                }
            }
        }

        random_point
    }

    /// Takes every inked pixel of `coverage` drawn with its origin at `(x, y)`.
    pub fn mark(&mut self, coverage: &GrayImage, x: u32, y: u32) {
        let mut first_row = None;
        for (dx, dy, px) in coverage.enumerate_pixels() {
            if px.0[0] == 0 {
                continue;
            }
            let (cx, cy) = ((x + dx) as usize, (y + dy) as usize);
            if cx < self.width && cy < self.height {
                self.cells[cy * self.width + cx] = 1;
                first_row = Some(first_row.map_or(cy, |row: usize| row.min(cy)));
            }
        }

        if let Some(row) = first_row {
            to_summed_area_table(&self.cells, &mut self.table, self.width, row);
        }
    }
}

/// https://blog.demofox.org/2018/04/16/prefix-sums-and-summed-area-tables/
///
/// `table` has one extra leading row and column of zeros. Rows of `cells`
/// before `start_row` are assumed to be summed already.
pub fn to_summed_area_table(cells: &[u32], table: &mut [u32], width: usize, start_row: usize) {
    if width == 0 {
        return;
    }
    let stride = width + 1;

    cells
        .chunks_exact(width)
        .enumerate()
        .skip(start_row)
        .for_each(|(y, row)| {
            let mut sum = 0;
            for (x, cell) in row.iter().enumerate() {
                sum += cell;
                table[(y + 1) * stride + x + 1] = sum + table[y * stride + x + 1];
            }
        });
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma};
    use nanorand::WyRand;

    use super::{Occupancy, Rect};

    #[test]
    fn empty_grid_accepts_any_fitting_box() {
        let occupancy = Occupancy::new(10, 8, vec![0; 80]);
        assert!(occupancy.region_is_empty(0, 0, 10, 8));
        assert!(!occupancy.region_is_empty(1, 0, 10, 8));

        let mut rng = WyRand::new_seed(7);
        let rect = Rect {
            width: 10,
            height: 8,
        };
        let point = occupancy.find_space_for_rect(&rect, &mut rng).unwrap();
        assert_eq!((point.x, point.y), (0, 0));
    }

    #[test]
    fn blocked_cells_are_avoided() {
        let mut blocked = vec![0; 25];
        blocked[2 * 5 + 2] = 1;
        let occupancy = Occupancy::new(5, 5, blocked);

        assert!(!occupancy.region_is_empty(0, 0, 3, 3));
        assert!(occupancy.region_is_empty(3, 0, 2, 5));
        assert!(occupancy.region_is_empty(0, 3, 5, 2));
        assert!(!occupancy.region_is_empty(2, 2, 1, 1));
        assert!(!occupancy.region_is_empty(5, 0, 1, 1));

        let mut rng = WyRand::new_seed(1);
        for _ in 0..20 {
            let rect = Rect {
                width: 3,
                height: 3,
            };
            let point = occupancy.find_space_for_rect(&rect, &mut rng);
            assert!(point.is_none(), "a 3x3 box always covers the center");
        }
    }

    #[test]
    fn oversized_or_empty_rect_has_no_space() {
        let occupancy = Occupancy::new(4, 4, vec![0; 16]);
        let mut rng = WyRand::new_seed(3);
        let too_wide = Rect {
            width: 5,
            height: 1,
        };
        assert!(occupancy.find_space_for_rect(&too_wide, &mut rng).is_none());
        let empty = Rect {
            width: 0,
            height: 2,
        };
        assert!(occupancy.find_space_for_rect(&empty, &mut rng).is_none());
    }

    #[test]
    fn marking_updates_table() {
        let mut occupancy = Occupancy::new(6, 6, vec![0; 36]);
        let mut coverage = GrayImage::new(2, 2);
        coverage.put_pixel(1, 1, Luma([200]));
        occupancy.mark(&coverage, 3, 3);

        assert!(!occupancy.region_is_empty(4, 4, 1, 1));
        assert!(occupancy.region_is_empty(3, 3, 1, 1));
        assert!(occupancy.region_is_empty(0, 0, 6, 4));
        assert!(occupancy.region_is_empty(0, 0, 4, 6));
        assert!(!occupancy.region_is_empty(0, 0, 6, 6));
    }

    #[test]
    fn placements_never_overlap() {
        let mut occupancy = Occupancy::new(20, 20, vec![0; 400]);
        let mut rng = WyRand::new_seed(11);
        let block = GrayImage::from_pixel(4, 4, Luma([255]));
        let rect = Rect {
            width: 4,
            height: 4,
        };

        let mut placed = vec![];
        while let Some(point) = occupancy.find_space_for_rect(&rect, &mut rng) {
            occupancy.mark(&block, point.x, point.y);
            placed.push(point);
        }

        assert!(placed.len() >= 6);
        for (i, a) in placed.iter().enumerate() {
            for b in &placed[i + 1..] {
                let apart = a.x + 4 <= b.x || b.x + 4 <= a.x || a.y + 4 <= b.y || b.y + 4 <= a.y;
                assert!(apart, "{a:?} overlaps {b:?}");
            }
        }
    }
}
