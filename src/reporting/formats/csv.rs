// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::types::Finding;
use anyhow::Result;
use csv::Writer;

/// Byte order mark so spreadsheet tools pick UTF-8 for the Chinese headers
const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

pub struct CsvReportGenerator;

impl CsvReportGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, findings: &[Finding]) -> Result<Vec<u8>> {
        let mut wtr = Writer::from_writer(UTF8_BOM.to_vec());

        wtr.write_record(["风险等级", "URL地址", "检测依据"])?;

        for finding in findings {
            wtr.write_record([
                finding.risk.report_label(),
                finding.url.as_str(),
                finding.evidence.as_str(),
            ])?;
        }

        let data = wtr.into_inner()?;
        Ok(data)
    }
}

impl Default for CsvReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}
