//! Arduino sketch generation.
//!
//! One renderer covers every policy and wiring, so the published listing
//! always matches what the controller itself does.

use crate::{
    actuator::relay_level, config::WiringConfig, policy::ControlPolicy, types::ActuatorState,
};

pub const SKETCH_FILE_NAME: &str = "DHT11_Fan_Control.ino";

pub fn render_sketch(
    policy: &ControlPolicy,
    wiring: &WiringConfig,
    cycle_interval_ms: u64,
) -> String {
    let relay_on = relay_level(ActuatorState::On, wiring.relay_active_low).as_str();
    let relay_off = relay_level(ActuatorState::Off, wiring.relay_active_low).as_str();
    let polarity = if wiring.relay_active_low {
        "active LOW"
    } else {
        "active HIGH"
    };

    let mut lines: Vec<String> = vec![
        format!("#define PIN {}", wiring.sensor_pin),
        "#define TYPE DHT11".into(),
        "#include <DHT.h>".into(),
        String::new(),
        format!("#define RELAY {}", wiring.relay_pin),
    ];
    if let Some(led) = wiring.led_pin {
        lines.push(format!("#define LED {led}"));
    }
    lines.extend([
        String::new(),
        "DHT dht(PIN, TYPE);".into(),
        String::new(),
        "bool fanState = false;   // fan status memory".into(),
        String::new(),
        "void applyFan(bool on)".into(),
        "{".into(),
        format!("  digitalWrite(RELAY, on ? {relay_on} : {relay_off}); // {polarity}"),
    ]);
    if wiring.led_pin.is_some() {
        lines.push("  digitalWrite(LED, on ? HIGH : LOW);".into());
    }
    lines.extend([
        "}".into(),
        String::new(),
        "void setup()".into(),
        "{".into(),
        format!("  Serial.begin({});", wiring.baud_rate),
        "  dht.begin();".into(),
        String::new(),
        "  pinMode(RELAY, OUTPUT);".into(),
    ]);
    if wiring.led_pin.is_some() {
        lines.push("  pinMode(LED, OUTPUT);".into());
    }
    lines.extend([
        String::new(),
        "  applyFan(false); // Fan OFF initially".into(),
        "}".into(),
        String::new(),
        "void loop()".into(),
        "{".into(),
        "  float t = dht.readTemperature();".into(),
        "  bool valid = !isnan(t);".into(),
        String::new(),
    ]);
    lines.extend(control_block(policy));
    lines.extend([
        String::new(),
        "  Serial.print(\"Temperature: \");".into(),
        "  if (valid) Serial.print(t); else Serial.print(\"--\");".into(),
        "  Serial.print(\" C | Fan: \");".into(),
        "  Serial.println(fanState ? \"ON\" : \"OFF\");".into(),
        String::new(),
        format!("  delay({cycle_interval_ms});"),
        "}".into(),
    ]);

    let mut sketch = lines.join("\n");
    sketch.push('\n');
    sketch
}

fn control_block(policy: &ControlPolicy) -> Vec<String> {
    match policy {
        ControlPolicy::Simple(simple) => {
            let threshold = celsius_literal(simple.threshold());
            vec![
                format!("  // FAN CONTROL ({threshold}°C threshold)"),
                "  if (valid)".into(),
                "  {".into(),
                format!("    fanState = (t >= {threshold});"),
                "    applyFan(fanState);".into(),
                "  }".into(),
            ]
        }
        ControlPolicy::Hysteresis(band) => {
            let on = celsius_literal(band.on());
            let off = celsius_literal(band.off());
            vec![
                format!("  // FAN CONTROL (ON at {on}°C, OFF at {off}°C)"),
                format!("  if (valid && t >= {on} && fanState == false)"),
                "  {".into(),
                "    fanState = true;".into(),
                "    applyFan(true);".into(),
                "  }".into(),
                format!("  else if (valid && t <= {off} && fanState == true)"),
                "  {".into(),
                "    fanState = false;".into(),
                "    applyFan(false);".into(),
                "  }".into(),
            ]
        }
    }
}

fn celsius_literal(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hysteresis_listing_uses_inclusive_edges() {
        let sketch = render_sketch(&ControlPolicy::default(), &WiringConfig::default(), 2_000);

        assert!(sketch.contains("if (valid && t >= 27 && fanState == false)"));
        assert!(sketch.contains("else if (valid && t <= 26 && fanState == true)"));
        assert!(sketch.contains("delay(2000);"));
        assert!(sketch.contains("Serial.begin(9600);"));
    }

    #[test]
    fn active_low_relay_is_driven_low_for_on() {
        let sketch = render_sketch(&ControlPolicy::default(), &WiringConfig::default(), 2_000);

        assert!(sketch.contains("#define RELAY 8"));
        assert!(sketch.contains("digitalWrite(RELAY, on ? LOW : HIGH); // active LOW"));
        assert!(sketch.contains("#define LED 12"));
    }

    #[test]
    fn simple_threshold_listing_without_led() {
        let wiring = WiringConfig {
            sensor_pin: 2,
            relay_pin: 7,
            relay_active_low: false,
            led_pin: None,
            baud_rate: 115_200,
        };
        let policy = ControlPolicy::simple(28.5).unwrap();

        let sketch = render_sketch(&policy, &wiring, 1_000);

        assert!(sketch.contains("#define PIN 2"));
        assert!(sketch.contains("fanState = (t >= 28.5);"));
        assert!(sketch.contains("digitalWrite(RELAY, on ? HIGH : LOW); // active HIGH"));
        assert!(!sketch.contains("LED"));
        assert!(sketch.contains("delay(1000);"));
    }

    #[test]
    fn status_print_matches_serial_format() {
        let sketch = render_sketch(&ControlPolicy::default(), &WiringConfig::default(), 2_000);

        assert!(sketch.contains("Serial.print(\"Temperature: \");"));
        assert!(sketch.contains("Serial.print(\" C | Fan: \");"));
        assert!(sketch.ends_with("}\n"));
    }
}
