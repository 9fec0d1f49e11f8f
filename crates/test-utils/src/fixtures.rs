//! Recorded upstream payloads, trimmed to a handful of rows each.

/// NOAA NDBC text products.
pub mod ndbc {
    /// `data/stations/station_table.txt`. Includes a header row and an
    /// over-long identifier that must be skipped.
    pub const STATION_TABLE: &str = r#"# STATION_ID | OWNER | TTYPE | HULL | NAME | PAYLOAD | LOCATION | TIMEZONE | FORECAST | NOTE
#
41001|N|3-meter foundation buoy|3D|EAST HATTERAS - 150 NM East of Cape Hatteras|SCOOP payload|34.724 N 72.317 W (34&#176;43'26" N 72&#176;19'1" W)|E|FZNT23|
46042|N|3-meter foundation buoy|3D|MONTEREY - 27NM WNW of Monterey, CA|SCOOP payload|36.785 N 122.396 W (36&#176;47'6" N 122&#176;23'46" W)|P|FZPN40|
BZBM3|N|C-MAN station| |8447930 - Woods Hole, MA| |41.523 N 70.672 W (41&#176;31'23" N 70&#176;40'19" W)|E| |
Station|header repeated|||||||
toolongid1|N|test| |Bogus| |0.000 N 0.000 W|E| |
"#;

    /// `data/realtime2/41001.txt`, newest row first.
    pub const REALTIME2: &str = "\
#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE
#yr  mo dy hr mn degT m/s  m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi  hPa    ft
2024 01 15 12 00 270  5.1  7.2   1.8  12.5   MM  MM 1018.5  15.2  14.8   MM  5.0 -1.2    MM
2024 01 15 11 00 260  4.8  6.9   1.7  12.1   MM  MM 1019.7  15.0  14.8   MM   MM   MM    MM
";

    /// Excerpt of `station_page.php?station=41001`.
    pub const STATION_PAGE: &str = r#"<html>
<head><title>NDBC Station Page</title></head>
<body>
<h1>Station 41001 - EAST HATTERAS</h1>
<p>Owned and maintained by National Data Buoy Center</p>
<p><b>34.724 N 72.317 W (34&#176;43'26" N 72&#176;19'1" W)</b></p>
<p>Site elevation: sea level</p>
</body>
</html>
"#;
}

/// NOAA ISD CSV products.
pub mod isd {
    /// `pub/data/noaa/isd-history.csv`. The last row has no coordinates.
    pub const HISTORY_CSV: &str = r#""USAF","WBAN","STATION NAME","CTRY","STATE","ICAO","LAT","LON","ELEV(M)","BEGIN","END"
"725030","14732","LA GUARDIA AIRPORT","US","NY","KLGA","40.779","-73.880","+0003.4","19730101","20250110"
"722950","23174","LOS ANGELES INTERNATIONAL AIRPORT","US","CA","KLAX","33.938","-118.389","+0029.6","19440101","20200101"
"037720","99999","HEATHROW","UK","","EGLL","51.478","-0.461","+0025.3","19480101","20250101"
"999999","00000","BOGUS NO LOCATION","US","","","","","","20000101","20250101"
"#;

    /// NCEI access service `global-hourly` CSV. Rows are out of order;
    /// the 12:00 row is the latest.
    pub const GLOBAL_HOURLY_CSV: &str = r#""STATION","DATE","SOURCE","REPORT_TYPE","CALL_SIGN","QUALITY_CONTROL","WND","CIG","VIS","TMP","DEW","SLP","AA1","AA2"
"72503014732","2024-01-15T11:00:00","4","FM-15","KLGA ","V020","270,1,N,0041,1","22000,1,9,N","016000,1,9,9","+0140,1","+0060,1","10135,1","01,0000,9,1",""
"72503014732","2024-01-15T12:00:00","4","FM-15","KLGA ","V020","999,1,N,0051,1","22000,1,9,N","016000,1,9,9","+0152,1","+0061,3","10132,1","01,0005,9,1","06,0023,9,1"
"72503014732","2024-01-15T10:00:00","4","FM-15","KLGA ","V020","260,1,N,0036,1","22000,1,9,N","016000,1,9,9","+0131,1","+0058,1","10139,1","",""
"#;
}

/// WMO OSCAR/Surface search responses.
pub mod oscar {
    /// One page of `search/station`. The last two records lack coordinates
    /// and an identifier respectively.
    pub const SEARCH_PAGE: &str = r#"{
  "pageCount": 1,
  "stationSearchResults": [
    {
      "wigosId": "0-20000-0-03772",
      "name": "HEATHROW",
      "latitude": 51.479,
      "longitude": -0.449,
      "elevation": 25.0,
      "territory": {"countryCode": "GB", "name": "United Kingdom of Great Britain and Northern Ireland"},
      "region": "Europe",
      "stationTypeName": "synoptic",
      "stationStatusCode": "operational",
      "supervisionOrganization": {"name": "Met Office", "acronym": "UKMO"}
    },
    {
      "wigosStationIdentifiers": [
        {"wigosStationIdentifier": "0-840-0-LGA", "primary": false},
        {"wigosStationIdentifier": "0-20000-0-72503", "primary": true}
      ],
      "name": "NEW YORK/LA GUARDIA",
      "latitude": 40.779,
      "longitude": -73.88,
      "elevation": 3.0,
      "territory": {"countryCode": "US", "name": "United States of America"},
      "region": "North America, Central America and the Caribbean",
      "stationClass": "synoptic",
      "declaredStatus": "operational"
    },
    {
      "wigosStationIdentifier": "0-840-0-KBOS",
      "name": "BOSTON LOGAN",
      "latitude": "42.361",
      "longitude": "-71.010",
      "territory": {"countryCode": "US", "name": "United States of America"},
      "stationClass": "aeronautical",
      "facilityType": "landFixed"
    },
    {
      "wigosId": "0-20000-0-99999",
      "name": "NOWHERE"
    },
    {
      "name": "NO IDENTIFIER",
      "latitude": 1.0,
      "longitude": 2.0
    }
  ]
}"#;
}

/// api.weather.gov GeoJSON responses.
pub mod nws {
    /// `stations?state=NY`. The third feature has no geometry.
    pub const STATIONS_NY: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "id": "https://api.weather.gov/stations/KJFK",
      "type": "Feature",
      "geometry": {"type": "Point", "coordinates": [-73.7639, 40.6392]},
      "properties": {
        "stationIdentifier": "KJFK",
        "name": "New York, Kennedy International Airport",
        "elevation": {"unitCode": "wmoUnit:m", "value": 3.9624},
        "state": "NY",
        "timeZone": "America/New_York"
      }
    },
    {
      "id": "https://api.weather.gov/stations/KLGA",
      "type": "Feature",
      "geometry": {"type": "Point", "coordinates": [-73.88, 40.7792]},
      "properties": {
        "stationIdentifier": "KLGA",
        "name": "New York, La Guardia Airport",
        "elevation": {"unitCode": "wmoUnit:m", "value": 6.096},
        "state": "NY",
        "timeZone": "America/New_York"
      }
    },
    {
      "id": "https://api.weather.gov/stations/XNOGEO",
      "type": "Feature",
      "geometry": null,
      "properties": {"stationIdentifier": "XNOGEO", "name": "No geometry"}
    }
  ]
}"#;

    /// `stations/KJFK/observations/latest`.
    pub const LATEST_OBSERVATION: &str = r#"{
  "type": "Feature",
  "geometry": {"type": "Point", "coordinates": [-73.76, 40.64]},
  "properties": {
    "station": "https://api.weather.gov/stations/KJFK",
    "timestamp": "2024-01-15T12:51:00+00:00",
    "textDescription": "Mostly Cloudy",
    "temperature": {"unitCode": "wmoUnit:degC", "value": 5.6, "qualityControl": "V"},
    "dewpoint": {"unitCode": "wmoUnit:degC", "value": -1.1, "qualityControl": "V"},
    "windDirection": {"unitCode": "wmoUnit:degree_(angle)", "value": 270, "qualityControl": "V"},
    "windSpeed": {"unitCode": "wmoUnit:km_h-1", "value": 18, "qualityControl": "V"},
    "windGust": {"unitCode": "wmoUnit:km_h-1", "value": null, "qualityControl": "Z"},
    "barometricPressure": {"unitCode": "wmoUnit:Pa", "value": 101800, "qualityControl": "V"},
    "seaLevelPressure": {"unitCode": "wmoUnit:Pa", "value": 101830, "qualityControl": "V"},
    "visibility": {"unitCode": "wmoUnit:m", "value": 16090, "qualityControl": "C"},
    "relativeHumidity": {"unitCode": "wmoUnit:percent", "value": 61.8, "qualityControl": "V"},
    "precipitationLastHour": {"unitCode": "wmoUnit:mm", "value": null, "qualityControl": "Z"}
  }
}"#;
}

/// Open-Meteo forecast responses.
pub mod openmeteo {
    /// `forecast?...&current=...`; `current.time` carries no offset.
    pub const CURRENT: &str = r#"{
  "latitude": 42.36,
  "longitude": -71.06,
  "timezone": "UTC",
  "current_units": {"time": "iso8601", "temperature_2m": "°C", "wind_speed_10m": "m/s"},
  "current": {
    "time": "2024-01-15T12:00",
    "interval": 900,
    "temperature_2m": 3.4,
    "relative_humidity_2m": 71,
    "precipitation": 0.0,
    "weather_code": 3,
    "cloud_cover": 100,
    "pressure_msl": 1021.7,
    "wind_speed_10m": 4.2,
    "wind_direction_10m": 248,
    "wind_gusts_10m": 9.1
  }
}"#;
}
