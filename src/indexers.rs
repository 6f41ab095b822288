use crate::core::Indexer;
use anyhow::Error;

const KM_PER_DEGREE: f64 = 111.32;

/// Fixed-size latitude/longitude grid. Cells are keyed `"{row}:{col}"`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GridIndexer {
    cell: f64,
    rows: i64,
    cols: i64,
}

impl GridIndexer {
    pub fn new(cell: f64) -> Result<Self, Error> {
        if !cell.is_finite() || cell <= 0.0 || cell > 10.0 {
            return Err(Error::msg(format!("invalid cell size for grid indexer: {}", cell)));
        }
        Ok(Self {
            cell,
            rows: (180.0 / cell).ceil() as i64,
            cols: (360.0 / cell).ceil() as i64,
        })
    }

    fn parse(index: &str) -> Option<(i64, i64)> {
        let (row, col) = index.split_once(':')?;
        Some((row.parse().ok()?, col.parse().ok()?))
    }

    // Latitude at the middle of a row.
    fn row_latitude(&self, row: i64) -> f64 {
        (row as f64 + 0.5) * self.cell - 90.0
    }
}

impl Indexer<String> for GridIndexer {
    fn index(&self, latitude: f64, longitude: f64) -> String {
        let row = (((latitude + 90.0) / self.cell).floor() as i64).clamp(0, self.rows - 1);
        let col = (((longitude + 180.0) / self.cell).floor() as i64).rem_euclid(self.cols);
        format!("{}:{}", row, col)
    }

    fn neighbors(&self, index: String, distance: f64) -> Vec<String> {
        let (row, col) = match Self::parse(&index) {
            Some(cell) => cell,
            None => return vec![index],
        };
        let k_rows = ((distance / (self.cell * KM_PER_DEGREE)).ceil() as i64).max(1);
        // Longitude degrees shrink towards the poles, so widen the column span.
        let shrink = self.row_latitude(row).to_radians().cos().max(0.01);
        let k_cols = ((distance / (self.cell * KM_PER_DEGREE * shrink)).ceil() as i64).clamp(1, self.cols / 2);
        let mut res = Vec::new();
        for r in (row - k_rows)..=(row + k_rows) {
            if r < 0 || r >= self.rows {
                continue;
            }
            for c in (col - k_cols)..=(col + k_cols) {
                res.push(format!("{}:{}", r, c.rem_euclid(self.cols)));
            }
        }
        res.sort();
        res.dedup();
        res
    }
}
