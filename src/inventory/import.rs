use thiserror::Error;

use crate::models::{NewDevice, Vendor};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Devices parsed from a CSV upload.
#[derive(Debug, Default)]
pub struct CsvImport {
    pub devices: Vec<NewDevice>,
    /// Rows dropped for having fewer than three fields or no name/IP.
    pub skipped: usize,
}

/// Parse `name,ip,vendor,location` rows. The first row is a header.
///
/// Unknown vendors fall back to the default vendor and an empty location is
/// left for the gateway to default.
pub fn parse_device_csv(text: &str) -> Result<CsvImport, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut import = CsvImport::default();
    for row in reader.records() {
        let row = row?;
        if row.len() < 3 {
            import.skipped += 1;
            continue;
        }

        let name = row.get(0).unwrap_or_default();
        let ip = row.get(1).unwrap_or_default();
        if name.is_empty() || ip.is_empty() {
            import.skipped += 1;
            continue;
        }

        let location = row.get(3).filter(|l| !l.is_empty()).map(str::to_string);
        import.devices.push(NewDevice {
            name: name.to_string(),
            ip: ip.to_string(),
            vendor: Vendor::parse_or_default(row.get(2).unwrap_or_default()),
            location,
        });
    }

    Ok(import)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_rows_without_name() {
        let import =
            parse_device_csv("name,ip,vendor,location\nSW1,10.0.0.1,Cisco IOS,Rack1\n,10.0.0.2,,\n")
                .unwrap();
        assert_eq!(import.devices.len(), 1);
        assert_eq!(import.skipped, 1);

        let sw1 = &import.devices[0];
        assert_eq!(sw1.name, "SW1");
        assert_eq!(sw1.ip, "10.0.0.1");
        assert_eq!(sw1.vendor, Vendor::Cisco);
        assert_eq!(sw1.location.as_deref(), Some("Rack1"));
    }

    #[test]
    fn test_short_rows_and_vendor_fallback() {
        let text = "name,ip,vendor,location\n\
                    short,10.0.0.3\n\
                    \"Edge, West\", 10.0.0.4 ,arista\n\
                    odd,10.0.0.5,Brocade,\n\
                    hp,10.0.0.6,HP COMWARE,Lab\n";
        let import = parse_device_csv(text).unwrap();

        assert_eq!(import.skipped, 1);
        assert_eq!(import.devices.len(), 3);
        assert_eq!(import.devices[0].name, "Edge, West");
        assert_eq!(import.devices[0].ip, "10.0.0.4");
        assert_eq!(import.devices[0].vendor, Vendor::Arista);
        assert!(import.devices[0].location.is_none());
        assert_eq!(import.devices[1].vendor, Vendor::Cisco);
        assert_eq!(import.devices[2].vendor, Vendor::Hp);
    }

    #[test]
    fn test_header_only() {
        let import = parse_device_csv("name,ip,vendor,location\n").unwrap();
        assert!(import.devices.is_empty());
        assert_eq!(import.skipped, 0);
    }
}
