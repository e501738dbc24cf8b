use image::{imageops, Rgba, RgbaImage};

use crate::error::{BoothError, BoothResult};

/// Row/column of a tile inside a sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCoords {
    pub row: u32,
    pub col: u32,
}

/// A decoded image cut into equally sized tiles, addressed row-major.
#[derive(Debug, Clone)]
pub struct TileSheet {
    image: RgbaImage,
    tile_width: u32,
    tile_height: u32,
    cols: u32,
}

impl TileSheet {
    pub fn new(image: RgbaImage, tile_width: u32, tile_height: u32, cols: u32) -> BoothResult<Self> {
        if tile_width == 0 || tile_height == 0 || cols == 0 {
            return Err(BoothError::Asset(format!(
                "tile sheet needs non-zero tile size and columns (got {tile_width}x{tile_height}, {cols} cols)"
            )));
        }
        Ok(Self {
            image,
            tile_width,
            tile_height,
            cols,
        })
    }

    /// A single-column sheet whose `rows` variants are stacked vertically.
    /// Tiles span the full image width.
    pub fn stacked(image: RgbaImage, rows: u32) -> BoothResult<Self> {
        let rows = rows.max(1);
        let (width, height) = image.dimensions();
        if height < rows {
            return Err(BoothError::Asset(format!(
                "sheet of height {height} cannot hold {rows} rows"
            )));
        }
        Self::new(image, width, height / rows, 1)
    }

    #[cfg(test)]
    pub fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.image.height() / self.tile_height
    }

    pub fn tile_coords(&self, index: u32) -> TileCoords {
        TileCoords {
            row: index / self.cols,
            col: index % self.cols,
        }
    }

    /// Source rectangle `(x, y, w, h)` of a tile, if it lies inside the image
    pub fn tile_rect(&self, index: u32) -> Option<(u32, u32, u32, u32)> {
        let TileCoords { row, col } = self.tile_coords(index);
        let x = col.checked_mul(self.tile_width)?;
        let y = row.checked_mul(self.tile_height)?;
        let fits_x = x.checked_add(self.tile_width)? <= self.image.width();
        let fits_y = y.checked_add(self.tile_height)? <= self.image.height();
        (fits_x && fits_y).then_some((x, y, self.tile_width, self.tile_height))
    }

    /// A transparent canvas with the dimensions of one tile
    pub fn blank_canvas(&self) -> RgbaImage {
        RgbaImage::new(self.tile_width, self.tile_height)
    }

    /// Replace `canvas` with the tile at `index`. An index outside the sheet
    /// clears the canvas and returns `false`.
    pub fn draw(&self, canvas: &mut RgbaImage, index: u32) -> bool {
        match self.tile_rect(index) {
            Some((x, y, w, h)) => {
                *canvas = imageops::crop_imm(&self.image, x, y, w, h).to_image();
                true
            }
            None => {
                clear(canvas);
                false
            }
        }
    }
}

/// Make every pixel fully transparent
pub fn clear(canvas: &mut RgbaImage) {
    for pixel in canvas.pixels_mut() {
        *pixel = Rgba([0, 0, 0, 0]);
    }
}
