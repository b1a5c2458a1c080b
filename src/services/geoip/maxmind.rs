//! MaxMind GeoLite2-City 本地数据库实现

use std::net::IpAddr;

use async_trait::async_trait;
use maxminddb::Reader;
use tracing::trace;

use super::provider::{GeoInfo, GeoIpLookup};

pub struct MaxMindProvider {
    reader: Reader<Vec<u8>>,
}

impl MaxMindProvider {
    pub fn new(path: &str) -> Result<Self, maxminddb::MaxMindDbError> {
        Ok(Self {
            reader: Reader::open_readfile(path)?,
        })
    }
}

#[async_trait]
impl GeoIpLookup for MaxMindProvider {
    async fn lookup(&self, ip: IpAddr) -> Option<GeoInfo> {
        let result = self.reader.lookup(ip).ok()?;
        let record: maxminddb::geoip2::City = result.decode().ok()??;

        let info = GeoInfo {
            country: record.country.iso_code.map(String::from),
            city: record.city.names.english.map(|s| s.to_string()),
        };
        trace!("MaxMind lookup for {}: {:?}", ip, info);
        Some(info)
    }

    fn name(&self) -> &'static str {
        "MaxMind"
    }
}
