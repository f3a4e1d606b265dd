use std::fs;
use std::path::Path;

use log::debug;
use qrcode::render::svg;
use qrcode::QrCode;

/// QR output for client onboarding.
pub trait QrRenderer {
    fn save_image(&self, payload: &str, path: &Path) -> Result<(), Box<dyn std::error::Error>>;

    /// Terminal display is best-effort; failures are logged and ignored.
    fn print_terminal(&self, payload: &str);
}

pub struct QrCodeRenderer;

impl QrRenderer for QrCodeRenderer {
    fn save_image(&self, payload: &str, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let code = QrCode::new(payload.as_bytes())?;
        let image = code
            .render()
            .min_dimensions(360, 360)
            .dark_color(svg::Color("#000000"))
            .light_color(svg::Color("#ffffff"))
            .build();
        fs::write(path, image)?;
        Ok(())
    }

    fn print_terminal(&self, payload: &str) {
        match QrCode::new(payload.as_bytes()) {
            Ok(code) => {
                let image = code.render::<char>().quiet_zone(false).module_dimensions(2, 1).build();
                println!("{}", image);
            }
            Err(e) => debug!("skipping terminal QR display: {}", e),
        }
    }
}
